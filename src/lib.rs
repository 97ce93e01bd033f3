// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! # runcached - stale-while-revalidate execution cache
//!
//! `runcached` lets a time-boxed caller, typically a monitoring check, get an
//! immediate answer for a slow command: the output and exit code of its last
//! run. When the cached result is old enough, a detached copy of `runcached`
//! re-runs the command in the background and publishes the new result for
//! the next call.
//!
//! ## Quick Start
//!
//! ```bash
//! # Serve the cached result, refreshing in the background when due
//! runcached /usr/lib/nagios/plugins/check_raid -v
//!
//! # Inspect the cache record without side effects
//! runcached --status /usr/lib/nagios/plugins/check_raid -v
//! ```
//!
//! Coordination between the foreground caller and the background worker
//! happens only through files and their modification times in the cache
//! directory.

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executors;
pub mod refresh;
pub mod utils;

// Re-export commonly used types
pub use cache::{CacheKey, CacheStore, ExitCodeState};
pub use config::Settings;
pub use errors::{RuncachedError, RuncachedResult};
pub use refresh::{ServeDecision, Staleness};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
