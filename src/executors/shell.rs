// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Shell executor
//!
//! Hands the joined command line to a shell, so pipelines and redirections
//! in the wrapped command work. Whoever supplies the command line accepts
//! that it is interpreted.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use super::{ExecutionResult, Executor};
use crate::cache::OutputSinks;
use crate::config::DEFAULT_SHELL;
use crate::errors::{RuncachedError, RuncachedResult};

/// Shell executor
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    /// Create an executor running commands through `shell -c`
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        sinks: OutputSinks,
    ) -> RuncachedResult<ExecutionResult> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sinks.stdout))
            .stderr(Stdio::from(sinks.stderr));

        let mut child = cmd.spawn().map_err(|e| RuncachedError::ToolExecutionFailed {
            shell: self.shell.clone(),
            error: e.to_string(),
            help: Some(format!("Shell '{}' may not be available", self.shell)),
        })?;
        // release our copies of the sinks; the child holds its own
        drop(cmd);

        let pid = child.id();
        debug!(?pid, command, "Wrapped command started");

        let status = child.wait().await.map_err(|e| RuncachedError::ToolExecutionFailed {
            shell: self.shell.clone(),
            error: e.to_string(),
            help: None,
        })?;

        Ok(ExecutionResult {
            exit_code: exit_code(status),
            pid,
            duration: start.elapsed(),
        })
    }

    async fn check_available(&self) -> RuncachedResult<bool> {
        Ok(which::which(&self.shell).is_ok())
    }
}

/// Exit code of a finished process, `128 + signal` when it was killed
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
