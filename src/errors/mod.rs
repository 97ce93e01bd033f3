// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Error types
//!
//! Only unexpected failures end up here. The expected outcomes of a
//! foreground check (no record, corrupt record, expired record) are exit
//! codes, not errors.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for runcached operations
pub type RuncachedResult<T> = Result<T, RuncachedError>;

/// Main error type for runcached
#[derive(Error, Debug, Diagnostic)]
pub enum RuncachedError {
    // ─────────────────────────────────────────────────────────────────────────
    // Cache Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to prepare cache directory '{path}': {error}")]
    #[diagnostic(
        code(runcached::cache_dir),
        help("Check that the parent directory exists and is writable, or pass --cache-dir")
    )]
    CacheDir { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(runcached::file_write_error))]
    FileWrite { path: PathBuf, error: String },

    #[error("Failed to publish '{from}' as '{to}': {error}")]
    #[diagnostic(
        code(runcached::publish_failed),
        help("The previous cached result is left untouched")
    )]
    Publish {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to launch background refresh: {error}")]
    #[diagnostic(code(runcached::spawn_failed))]
    Spawn {
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Refresh lock '{path}' is held by process {pid} ({age_secs}s old)")]
    #[diagnostic(code(runcached::lock_held))]
    LockHeld {
        path: PathBuf,
        pid: u32,
        age_secs: u64,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Shell '{shell}' could not run the command: {error}")]
    #[diagnostic(code(runcached::tool_execution_failed))]
    ToolExecutionFailed {
        shell: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(runcached::io_error))]
    Io { message: String },

    #[error("JSON serialization error: {message}")]
    #[diagnostic(code(runcached::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for RuncachedError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_json::Error> for RuncachedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl RuncachedError {
    /// Build a write error for `path`
    pub fn write(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::FileWrite {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create a spawn error, suggesting a fix when the executable went missing
    pub fn spawn_failed(error: &std::io::Error) -> Self {
        let help = match error.kind() {
            std::io::ErrorKind::NotFound => {
                Some("The runcached executable moved or was deleted since this process started".into())
            }
            std::io::ErrorKind::PermissionDenied => {
                Some("The runcached executable is not executable by this user".into())
            }
            _ => None,
        };

        Self::Spawn {
            error: error.to_string(),
            help,
        }
    }
}
