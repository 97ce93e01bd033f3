// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Refresh launcher
//!
//! Starts a detached copy of this executable in execute mode. The copy runs
//! in its own session with its stdio on the null device, outlives the
//! caller and is never waited on.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::cache::join_command;
use crate::config::Settings;
use crate::errors::{RuncachedError, RuncachedResult};

/// Leading command token that selects execute mode
pub const EXECUTE_TOKEN: &str = "0";

/// Spawns background workers
#[derive(Debug, Clone)]
pub struct RefreshLauncher {
    /// Executable started in execute mode
    executable: PathBuf,
    /// Options the worker needs to find the same record
    forwarded: Vec<OsString>,
}

impl RefreshLauncher {
    /// Launcher re-invoking the current executable
    pub fn current(settings: &Settings, verbose: bool) -> RuncachedResult<Self> {
        let executable = std::env::current_exe().map_err(|e| RuncachedError::spawn_failed(&e))?;
        Ok(Self::with_executable(executable, settings, verbose))
    }

    /// Launcher re-invoking `executable`
    pub fn with_executable(executable: impl Into<PathBuf>, settings: &Settings, verbose: bool) -> Self {
        let mut forwarded: Vec<OsString> = vec!["--cache-dir".into(), settings.cache_dir.clone().into()];
        if settings.merge_stderr {
            forwarded.push("--merge-stderr".into());
        }
        if verbose {
            forwarded.push("--verbose".into());
        }

        Self {
            executable: executable.into(),
            forwarded,
        }
    }

    /// Full argument list of a worker for `command`
    pub fn worker_args(&self, command: &[String]) -> Vec<OsString> {
        let mut args = self.forwarded.clone();
        args.push(EXECUTE_TOKEN.into());
        args.extend(command.iter().map(OsString::from));
        args
    }

    /// Start a detached worker and return its pid without waiting
    pub fn spawn(&self, command: &[String]) -> RuncachedResult<u32> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(self.worker_args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New session: the worker survives the caller and its terminal
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x00000008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        debug!(executable = %self.executable.display(), "Spawning refresh worker");

        let child = cmd.spawn().map_err(|e| RuncachedError::spawn_failed(&e))?;
        let pid = child.id();

        info!(pid, command = %join_command(command), "Launched background refresh");
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_worker_args_forward_settings() {
        let settings = Settings::default()
            .with_cache_dir("/tmp/rc-cache")
            .with_merge_stderr(true);
        let launcher = RefreshLauncher::with_executable("/usr/bin/runcached", &settings, true);

        let worker = launcher.worker_args(&args(&["check_disk", "-w", "10%"]));
        let expected: Vec<OsString> = [
            "--cache-dir",
            "/tmp/rc-cache",
            "--merge-stderr",
            "--verbose",
            "0",
            "check_disk",
            "-w",
            "10%",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        assert_eq!(worker, expected);
    }

    #[test]
    fn test_worker_args_minimal() {
        let settings = Settings::default().with_cache_dir("/c");
        let launcher = RefreshLauncher::with_executable("x", &settings, false);
        let worker = launcher.worker_args(&args(&["echo", "hi"]));

        assert_eq!(worker.len(), 5);
        assert_eq!(worker[2], OsString::from(EXECUTE_TOKEN));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_returns_without_waiting() {
        let settings = Settings::default();
        let launcher = RefreshLauncher::with_executable("/bin/sh", &settings, false);
        // sh treats the forwarded options as a script name and fails; the
        // launcher neither waits nor cares
        let pid = launcher.spawn(&args(&["sleep", "5"])).unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_spawn_missing_executable() {
        let settings = Settings::default();
        let launcher =
            RefreshLauncher::with_executable("/nonexistent/runcached-worker", &settings, false);

        assert!(matches!(
            launcher.spawn(&args(&["true"])),
            Err(RuncachedError::Spawn { help: Some(_), .. })
        ));
    }
}
