// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Refresh lock
//!
//! Serializes the "is a refresh due, then launch it" decision between
//! foreground callers of the same key. The lock is a file created with
//! `create_new`, holding `pid:acquired_at`. It is only held across the
//! re-check and the spawn, never for the duration of the refresh itself.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::errors::{RuncachedError, RuncachedResult};

/// Lock metadata stored in the lock file
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockMetadata {
    pid: u32,
    acquired_at: u64,
}

impl LockMetadata {
    fn serialize(&self) -> String {
        format!("{}:{}", self.pid, self.acquired_at)
    }

    fn deserialize(s: &str) -> Option<Self> {
        let (pid, acquired_at) = s.trim().split_once(':')?;
        Some(Self {
            pid: pid.parse().ok()?,
            acquired_at: acquired_at.parse().ok()?,
        })
    }
}

/// Non-blocking lock around the refresh launch of one key
#[derive(Debug, Clone)]
pub struct RefreshLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RefreshLock {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    /// Try to take the lock without waiting
    ///
    /// A lock older than the stale threshold is broken once and retried.
    ///
    /// # Errors
    /// `LockHeld` when another live launcher owns the lock, `FileWrite` when
    /// the lock file cannot be created at all.
    pub fn try_acquire(&self) -> RuncachedResult<LockGuard> {
        let metadata = LockMetadata {
            pid: std::process::id(),
            acquired_at: now_secs(),
        };

        match self.create(&metadata) {
            Err(RuncachedError::LockHeld { age_secs, .. })
                if Duration::from_secs(age_secs) > self.stale_after =>
            {
                if self.break_if_stale() {
                    self.create(&metadata)
                } else {
                    Err(self.holder())
                }
            }
            other => other,
        }
    }

    /// Remove the lock file if it is still stale
    ///
    /// Another caller may have broken the same stale lock and taken a fresh
    /// one since we looked, so the holder is read again right before the
    /// removal. A fresh lock is left alone.
    fn break_if_stale(&self) -> bool {
        if !self.path.exists() {
            // already broken by someone else, the create decides
            return true;
        }
        let (pid, age_secs) = match self.holder() {
            RuncachedError::LockHeld { pid, age_secs, .. } => (pid, age_secs),
            _ => return false,
        };
        if Duration::from_secs(age_secs) <= self.stale_after {
            debug!(lock = %self.path.display(), holder_pid = pid, "Stale lock was replaced meanwhile");
            return false;
        }

        warn!(
            lock = %self.path.display(),
            holder_pid = pid,
            age_secs,
            "Breaking stale refresh lock"
        );
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                debug!(lock = %self.path.display(), error = %e, "Failed to break refresh lock");
                false
            }
        }
    }

    fn create(&self, metadata: &LockMetadata) -> RuncachedResult<LockGuard> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                file.write_all(metadata.serialize().as_bytes())
                    .map_err(|e| RuncachedError::write(&self.path, e))?;
                debug!(lock = %self.path.display(), "Acquired refresh lock");
                Ok(LockGuard {
                    path: self.path.clone(),
                    content: metadata.serialize(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(self.holder()),
            Err(e) => Err(RuncachedError::write(&self.path, e)),
        }
    }

    /// Describe whoever holds the lock
    ///
    /// An unreadable or half-written lock file is aged by its mtime so that a
    /// launcher that crashed between create and write is eventually broken.
    fn holder(&self) -> RuncachedError {
        let now = now_secs();
        let (pid, age_secs) = match fs::read_to_string(&self.path)
            .ok()
            .as_deref()
            .and_then(LockMetadata::deserialize)
        {
            Some(existing) => (existing.pid, now.saturating_sub(existing.acquired_at)),
            None => (0, mtime_age(&self.path).unwrap_or(0)),
        };

        RuncachedError::LockHeld {
            path: self.path.clone(),
            pid,
            age_secs,
        }
    }
}

/// Guard that releases the lock when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    content: String,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // a lock broken as stale and taken by another caller is theirs now
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim() == self.content => {}
            Ok(_) => {
                debug!(lock = %self.path.display(), "Refresh lock was taken over, leaving it");
                return;
            }
            Err(_) => return,
        }
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(lock = %self.path.display(), error = %e, "Failed to release refresh lock");
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn mtime_age(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).ok()?.as_secs())
}
