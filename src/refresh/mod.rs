// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Refresh state machine
//!
//! Reads the record's timestamps, decides whether a background refresh is
//! due and launches it under the refresh lock.

mod launcher;
mod staleness;

pub use launcher::{RefreshLauncher, EXECUTE_TOKEN};
pub use staleness::{
    Age, Ages, ServeDecision, Staleness, EXIT_CORRUPT, EXIT_NO_RECORD, EXIT_WAITING,
};

use serde::Serialize;
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::cache::{CachePaths, CacheStore, ExitCodeState, RefreshLock};
use crate::config::Settings;
use crate::errors::{RuncachedError, RuncachedResult};

/// Result of a refresh attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "refresh", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Completion or last launch is too recent
    NotDue,
    /// Another caller holds the refresh lock
    AlreadyLaunching { holder_pid: u32 },
    /// A worker was started
    Launched { pid: u32 },
}

/// Read both ages of a record at `now`
pub async fn read_ages(store: &CacheStore, paths: &CachePaths, now: SystemTime) -> Ages {
    Ages {
        complete: Age::since(store.completed_at(paths).await, now),
        start: Age::since(store.started_at(paths).await, now),
    }
}

/// Read the exit code of a record together with its completion age
///
/// The exit code is read first. Its file is only ever replaced by a rename,
/// so once a code was read the file has a modification time, and a record
/// published meanwhile is never judged by the age of its predecessor.
pub async fn read_completion(
    store: &CacheStore,
    paths: &CachePaths,
    now: SystemTime,
) -> (ExitCodeState, Age) {
    let exit_code = store.read_exit_code(paths).await;
    let complete = Age::since(store.completed_at(paths).await, now);
    (exit_code, complete)
}

/// Decides on and launches background refreshes
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    staleness: Staleness,
    lock_stale_after: Duration,
}

impl RefreshCoordinator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            staleness: Staleness {
                min_refresh_interval: settings.min_refresh_interval,
                max_serve_age: settings.max_serve_age,
            },
            lock_stale_after: settings.lock_stale_after,
        }
    }

    pub fn staleness(&self) -> &Staleness {
        &self.staleness
    }

    /// Launch a refresh if one is due
    ///
    /// `ages` is the caller's first look. Under the lock the ages are read
    /// again, so of several callers racing through the same window only the
    /// first one spawns.
    pub async fn refresh_if_due(
        &self,
        store: &CacheStore,
        paths: &CachePaths,
        ages: &Ages,
        launcher: &RefreshLauncher,
        command: &[String],
    ) -> RuncachedResult<RefreshOutcome> {
        if !self.staleness.refresh_due(ages) {
            return Ok(RefreshOutcome::NotDue);
        }

        let lock = RefreshLock::new(paths.lock(), self.lock_stale_after);
        let _guard = match lock.try_acquire() {
            Ok(guard) => guard,
            Err(RuncachedError::LockHeld { pid, .. }) => {
                debug!(key = %paths.key(), holder_pid = pid, "Refresh already being launched");
                return Ok(RefreshOutcome::AlreadyLaunching { holder_pid: pid });
            }
            Err(e) => return Err(e),
        };

        let current = read_ages(store, paths, SystemTime::now()).await;
        if !self.staleness.refresh_due(&current) {
            debug!(key = %paths.key(), "Refresh launched by another caller meanwhile");
            return Ok(RefreshOutcome::NotDue);
        }

        let pid = launcher.spawn(command)?;
        store.touch_marker(&paths.start_marker(), pid).await?;

        Ok(RefreshOutcome::Launched { pid })
    }
}
