// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Staleness evaluation
//!
//! Two independent questions are answered for every foreground call: may a
//! refresh be launched now, and may the cached result be served. Both can
//! be yes at once, which is the stale-while-revalidate case.
//!
//! Ages come from file modification times and are truncated to whole
//! seconds. Clock skew between writer and reader, or a coarse filesystem
//! timestamp resolution, shifts every decision by the same amount; a
//! timestamp in the future reads as age zero.

use serde::Serialize;
use std::time::{Duration, SystemTime};

use crate::cache::ExitCodeState;

/// Process exit code when the exit-code file cannot be parsed
pub const EXIT_CORRUPT: i32 = 99;

/// Process exit code when the record is too old and a refresh is pending
pub const EXIT_WAITING: i32 = 100;

/// Process exit code when no exit-code file exists
pub const EXIT_NO_RECORD: i32 = 102;

/// Age of a timestamp, `None` when the timestamp is absent
///
/// An absent timestamp is older than any threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Age(Option<u64>);

impl Age {
    pub fn since(timestamp: Option<SystemTime>, now: SystemTime) -> Self {
        Self(timestamp.map(|t| now.duration_since(t).map(|d| d.as_secs()).unwrap_or(0)))
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Some(secs))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub fn secs(&self) -> Option<u64> {
        self.0
    }

    /// Strictly older than `threshold`
    pub fn exceeds(&self, threshold: Duration) -> bool {
        match self.0 {
            Some(secs) => secs > threshold.as_secs(),
            None => true,
        }
    }
}

impl std::fmt::Display for Age {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(secs) => write!(f, "{secs}s"),
            None => f.write_str("never"),
        }
    }
}

/// The two ages the decision is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ages {
    /// Since the last completed run
    pub complete: Age,
    /// Since the last refresh launch
    pub start: Age,
}

/// Thresholds of the evaluation
#[derive(Debug, Clone, Copy)]
pub struct Staleness {
    pub min_refresh_interval: Duration,
    pub max_serve_age: Duration,
}

/// What to hand back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ServeDecision {
    /// Serve the cached output and exit with the cached code
    Serve { exit_code: i32 },
    /// The exit-code file holds garbage
    Corrupt { error: String },
    /// The record exists but is older than the serve limit
    Expired,
    /// No exit-code file at all
    NoRecord,
}

impl ServeDecision {
    /// Exit code of the foreground process for this decision
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Serve { exit_code } => *exit_code,
            Self::Corrupt { .. } => EXIT_CORRUPT,
            Self::Expired => EXIT_WAITING,
            Self::NoRecord => EXIT_NO_RECORD,
        }
    }
}

impl Staleness {
    /// Whether a new refresh may be launched
    ///
    /// Both the last completion and the last launch must be older than the
    /// minimum refresh interval; exactly at the interval is not yet due.
    pub fn refresh_due(&self, ages: &Ages) -> bool {
        ages.complete.exceeds(self.min_refresh_interval) && ages.start.exceeds(self.min_refresh_interval)
    }

    /// Whether and how the cached record can be served
    ///
    /// A completion age exactly at the serve limit is still served.
    pub fn serve(&self, ages: &Ages, exit_code: &ExitCodeState) -> ServeDecision {
        match exit_code {
            ExitCodeState::Present(code) if !ages.complete.exceeds(self.max_serve_age) => {
                ServeDecision::Serve { exit_code: *code }
            }
            ExitCodeState::Corrupt { error, .. } => ServeDecision::Corrupt {
                error: error.clone(),
            },
            ExitCodeState::Present(_) => ServeDecision::Expired,
            ExitCodeState::Absent => ServeDecision::NoRecord,
        }
    }
}
