// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Cache store for command results
//!
//! One record per command line, kept as flat files under the cache
//! directory. Records are never evicted.

mod filesystem;
mod key;
mod lock;

pub use filesystem::{CachePaths, CacheStore, OutputSinks, StagedOutput};
pub use key::{join_command, CacheKey, PREFIX_CHARS};
pub use lock::{LockGuard, RefreshLock};

use serde::Serialize;

/// Contents of a record's exit-code file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ExitCodeState {
    /// No exit-code file, or it could not be read
    Absent,
    /// File exists but does not hold an integer
    Corrupt { content: String, error: String },
    /// Exit code of the last completed run
    Present(i32),
}

impl ExitCodeState {
    /// Classify the text of an exit-code file
    pub fn parse(content: &str) -> Self {
        match content.trim().parse::<i32>() {
            Ok(code) => Self::Present(code),
            Err(e) => Self::Corrupt {
                content: content.to_string(),
                error: e.to_string(),
            },
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Published output of the last completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit_code() {
        assert_eq!(ExitCodeState::parse("0"), ExitCodeState::Present(0));
        assert_eq!(ExitCodeState::parse(" 2\n"), ExitCodeState::Present(2));
        assert_eq!(ExitCodeState::parse("-1"), ExitCodeState::Present(-1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(ExitCodeState::parse(""), ExitCodeState::Corrupt { .. }));
        assert!(matches!(ExitCodeState::parse("ok"), ExitCodeState::Corrupt { .. }));
        assert!(matches!(ExitCodeState::parse("1.5"), ExitCodeState::Corrupt { .. }));
        assert!(ExitCodeState::parse("ok").exists());
        assert!(!ExitCodeState::Absent.exists());
    }
}
