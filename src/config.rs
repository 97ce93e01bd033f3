// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Runtime settings
//!
//! Defaults are fixed constants; the CLI can override them per invocation.

use std::path::PathBuf;
use std::time::Duration;

/// Minimum time between two refresh attempts of the same command
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Cached output older than this is no longer served
pub const DEFAULT_MAX_SERVE_AGE: Duration = Duration::from_secs(600);

/// A refresh lock older than this belongs to a crashed launcher
pub const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(60);

/// Shell used to interpret the wrapped command line
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Name of the cache root below the system temp directory
pub const CACHE_DIR_NAME: &str = "runcached";

/// Settings shared by the foreground check and the background worker
#[derive(Debug, Clone)]
pub struct Settings {
    /// Flat directory holding every cache record
    pub cache_dir: PathBuf,
    /// Minimum age of both completion and last start before refreshing
    pub min_refresh_interval: Duration,
    /// Maximum completion age that is still served
    pub max_serve_age: Duration,
    /// Age after which a refresh lock is broken
    pub lock_stale_after: Duration,
    /// Shell that interprets the joined command line
    pub shell: String,
    /// Write stderr into the stdout file instead of a separate one
    ///
    /// Not part of the cache key: merged and separate callers of the same
    /// command share one record, and whichever layout published last wins.
    /// A merged publication removes the separate stderr file, so a separate
    /// caller then serves an empty stderr rather than an older run's.
    pub merge_stderr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            max_serve_age: DEFAULT_MAX_SERVE_AGE,
            lock_stale_after: DEFAULT_LOCK_STALE_AFTER,
            shell: DEFAULT_SHELL.to_string(),
            merge_stderr: false,
        }
    }
}

impl Settings {
    /// Use a different cache root
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Override the minimum refresh interval
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Override the maximum serve age
    pub fn with_max_serve_age(mut self, age: Duration) -> Self {
        self.max_serve_age = age;
        self
    }

    /// Interpret commands with a different shell
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Merge stderr into the stdout record
    pub fn with_merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }
}

/// Default cache root: `<temp dir>/runcached`
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}
