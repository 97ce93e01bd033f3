// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Command execution
//!
//! This module provides the executor trait, the shell implementation and
//! the worker routine that runs a command into a cache record.

mod shell;

pub use shell::ShellExecutor;

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::cache::{join_command, CachePaths, CacheStore, OutputSinks};
use crate::errors::RuncachedResult;

/// Result of running the wrapped command
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit code, a non-zero value is a normal outcome
    pub exit_code: i32,

    /// Pid of the process that ran the command
    pub pid: Option<u32>,

    /// Execution duration
    pub duration: Duration,
}

/// Trait for command executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command` to completion with its output going into `sinks`
    async fn execute(&self, command: &str, sinks: OutputSinks) -> RuncachedResult<ExecutionResult>;

    /// Check if the executor can run at all
    async fn check_available(&self) -> RuncachedResult<bool>;
}

/// Run a command and publish its result into the record at `paths`
///
/// Used by the detached worker. The command's own failure is cached like
/// any other result; a filesystem failure aborts without touching the
/// previously published record.
pub async fn refresh_record(
    store: &CacheStore,
    paths: &CachePaths,
    executor: &dyn Executor,
    args: &[String],
) -> RuncachedResult<ExecutionResult> {
    let command = join_command(args);
    let (staged, sinks) = store.stage(paths)?;

    let result = match executor.execute(&command, sinks).await {
        Ok(result) => result,
        Err(e) => {
            staged.discard();
            return Err(e);
        }
    };

    store
        .publish(paths, staged, result.exit_code, &command)
        .await?;
    store
        .touch_marker(&paths.worker_marker(), std::process::id())
        .await?;

    info!(
        key = %paths.key(),
        exit_code = result.exit_code,
        duration_ms = result.duration.as_millis() as u64,
        "Refreshed cache record"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, ExitCodeState};
    use tempfile::TempDir;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_refresh_record_publishes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().to_path_buf(), false).unwrap();
        let command = args(&["echo", "hi"]);
        let paths = store.paths(&CacheKey::derive(&command));

        let result = refresh_record(&store, &paths, &ShellExecutor::default(), &command)
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(store.read_output(&paths).await.stdout, b"hi\n");
        assert_eq!(store.read_exit_code(&paths).await, ExitCodeState::Present(0));
        assert_eq!(std::fs::read_to_string(paths.command()).unwrap(), "echo hi");
        assert_eq!(
            std::fs::read_to_string(paths.worker_marker()).unwrap().trim(),
            std::process::id().to_string()
        );
    }

    #[tokio::test]
    async fn test_failed_shell_keeps_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().to_path_buf(), false).unwrap();
        let command = args(&["echo", "old"]);
        let paths = store.paths(&CacheKey::derive(&command));

        refresh_record(&store, &paths, &ShellExecutor::default(), &command)
            .await
            .unwrap();

        let broken = ShellExecutor::new("/nonexistent/shell");
        assert!(refresh_record(&store, &paths, &broken, &command).await.is_err());

        assert_eq!(store.read_output(&paths).await.stdout, b"old\n");
        assert_eq!(store.read_exit_code(&paths).await, ExitCodeState::Present(0));

        let leftovers = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_wrapped_failure_is_cached() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().to_path_buf(), false).unwrap();
        let command = args(&["sh", "-c", "'exit 4'"]);
        let paths = store.paths(&CacheKey::derive(&command));

        let result = refresh_record(&store, &paths, &ShellExecutor::default(), &command)
            .await
            .unwrap();

        assert_eq!(result.exit_code, 4);
        assert_eq!(store.read_exit_code(&paths).await, ExitCodeState::Present(4));
    }
}
