// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Filesystem-based cache store
//!
//! Every record is a set of flat files named `<key><suffix>` in one cache
//! directory. Output files are published by rename; the exit-code file is
//! published last and its presence marks a complete record.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::{CacheKey, CachedOutput, ExitCodeState};
use crate::config::Settings;
use crate::errors::{RuncachedError, RuncachedResult};

/// Paths of every file belonging to one record
#[derive(Debug, Clone)]
pub struct CachePaths {
    dir: PathBuf,
    key: CacheKey,
    merge_stderr: bool,
}

impl CachePaths {
    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.key, suffix))
    }

    /// Key the paths belong to
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether stderr shares the stdout file
    pub fn merged(&self) -> bool {
        self.merge_stderr
    }

    pub fn stdout(&self) -> PathBuf {
        self.file(".stdout")
    }

    pub fn stderr(&self) -> PathBuf {
        if self.merge_stderr {
            self.stdout()
        } else {
            self.file(".stderr")
        }
    }

    pub fn exit_code(&self) -> PathBuf {
        self.file(".exitcode")
    }

    pub fn command(&self) -> PathBuf {
        self.file(".cmd")
    }

    /// Touched by every foreground caller
    pub fn caller_marker(&self) -> PathBuf {
        self.file("-runcached.pid")
    }

    /// Touched when a refresh is launched; its mtime is the last start time
    pub fn start_marker(&self) -> PathBuf {
        self.file("-child.pid")
    }

    /// Written by the worker after the command finished
    pub fn worker_marker(&self) -> PathBuf {
        self.file("-child-child.pid")
    }

    pub fn lock(&self) -> PathBuf {
        self.file(".lock")
    }

    fn temp(&self, suffix: &str, stamp: u128) -> PathBuf {
        self.file(&format!("{suffix}.tmp.{stamp}"))
    }
}

/// Temporary files written by one run, waiting for publication
#[derive(Debug)]
pub struct StagedOutput {
    stdout_tmp: PathBuf,
    stderr_tmp: Option<PathBuf>,
    exit_code_tmp: PathBuf,
}

impl StagedOutput {
    /// Temporary stdout path
    pub fn stdout_path(&self) -> &Path {
        &self.stdout_tmp
    }

    /// Remove the temporary files of a run that will not be published
    pub fn discard(self) {
        let _ = std::fs::remove_file(&self.stdout_tmp);
        if let Some(ref stderr) = self.stderr_tmp {
            let _ = std::fs::remove_file(stderr);
        }
        let _ = std::fs::remove_file(&self.exit_code_tmp);
    }
}

/// Open sinks handed to the wrapped command
#[derive(Debug)]
pub struct OutputSinks {
    pub stdout: File,
    pub stderr: File,
}

/// Filesystem-backed cache store
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Cache directory
    cache_dir: PathBuf,
    /// Record layout
    merge_stderr: bool,
}

impl CacheStore {
    /// Open the store, creating the cache directory if it doesn't exist
    pub fn open(settings: &Settings) -> RuncachedResult<Self> {
        Self::new(settings.cache_dir.clone(), settings.merge_stderr)
    }

    /// Create a store rooted at `cache_dir`
    pub fn new(cache_dir: PathBuf, merge_stderr: bool) -> RuncachedResult<Self> {
        if !cache_dir.is_dir() {
            std::fs::create_dir_all(&cache_dir).map_err(|e| RuncachedError::CacheDir {
                path: cache_dir.clone(),
                error: e.to_string(),
            })?;
        }

        Ok(Self {
            cache_dir,
            merge_stderr,
        })
    }

    /// Read-only handle that creates nothing, for status reports
    pub fn view(settings: &Settings) -> Self {
        Self {
            cache_dir: settings.cache_dir.clone(),
            merge_stderr: settings.merge_stderr,
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File layout of one record
    pub fn paths(&self, key: &CacheKey) -> CachePaths {
        CachePaths {
            dir: self.cache_dir.clone(),
            key: key.clone(),
            merge_stderr: self.merge_stderr,
        }
    }

    /// Modification time of a readable regular file
    ///
    /// Anything that prevents reading the timestamp counts as absent.
    pub async fn modified(path: &Path) -> Option<SystemTime> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.modified().ok(),
            Ok(_) => None,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "Treating unreadable file as absent");
                }
                None
            }
        }
    }

    /// Time of the last completed run
    pub async fn completed_at(&self, paths: &CachePaths) -> Option<SystemTime> {
        Self::modified(&paths.exit_code()).await
    }

    /// Time the last refresh was launched
    pub async fn started_at(&self, paths: &CachePaths) -> Option<SystemTime> {
        Self::modified(&paths.start_marker()).await
    }

    /// Read and classify the exit-code file
    pub async fn read_exit_code(&self, paths: &CachePaths) -> ExitCodeState {
        let path = paths.exit_code();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => ExitCodeState::parse(&content),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Exit code file unreadable");
                }
                ExitCodeState::Absent
            }
        }
    }

    /// Read the published output files
    ///
    /// A missing output file reads as empty.
    pub async fn read_output(&self, paths: &CachePaths) -> CachedOutput {
        let stdout = read_or_empty(&paths.stdout()).await;
        let stderr = if paths.merged() {
            Vec::new()
        } else {
            read_or_empty(&paths.stderr()).await
        };

        CachedOutput { stdout, stderr }
    }

    /// Write `pid` into a marker file, refreshing its mtime
    pub async fn touch_marker(&self, path: &Path, pid: u32) -> RuncachedResult<()> {
        tokio::fs::write(path, format!("{pid}\n"))
            .await
            .map_err(|e| RuncachedError::write(path, e))
    }

    /// Open the temporary sinks for a run
    ///
    /// Names carry a nanosecond timestamp so concurrent workers never share
    /// a temporary file.
    pub fn stage(&self, paths: &CachePaths) -> RuncachedResult<(StagedOutput, OutputSinks)> {
        let stamp = unix_nanos();

        let stdout_tmp = paths.temp(".stdout", stamp);
        let stdout = File::create(&stdout_tmp).map_err(|e| RuncachedError::write(&stdout_tmp, e))?;

        let (stderr, stderr_tmp) = if paths.merged() {
            let shared = stdout
                .try_clone()
                .map_err(|e| RuncachedError::write(&stdout_tmp, e))?;
            (shared, None)
        } else {
            let stderr_tmp = paths.temp(".stderr", stamp);
            match File::create(&stderr_tmp) {
                Ok(file) => (file, Some(stderr_tmp)),
                Err(e) => {
                    let _ = std::fs::remove_file(&stdout_tmp);
                    return Err(RuncachedError::write(&stderr_tmp, e));
                }
            }
        };

        debug!(stdout = %stdout_tmp.display(), "Staged output sinks");

        let staged = StagedOutput {
            stdout_tmp,
            stderr_tmp,
            exit_code_tmp: paths.temp(".exitcode", stamp),
        };

        Ok((staged, OutputSinks { stdout, stderr }))
    }

    /// Publish a finished run
    ///
    /// Order is fixed: output renames, then the command text, then the exit
    /// code. A reader that sees the new exit code therefore sees the new
    /// output. On failure the previous record stays as it was, apart from
    /// whichever renames already happened.
    pub async fn publish(
        &self,
        paths: &CachePaths,
        staged: StagedOutput,
        exit_code: i32,
        command: &str,
    ) -> RuncachedResult<()> {
        rename(&staged.stdout_tmp, &paths.stdout()).await?;
        if let Some(ref stderr_tmp) = staged.stderr_tmp {
            rename(stderr_tmp, &paths.stderr()).await?;
        } else {
            // an unmerged caller of the same key must not pair this stdout
            // with the stderr of an older run
            let separate = paths.file(".stderr");
            match tokio::fs::remove_file(&separate).await {
                Ok(()) => debug!(key = %paths.key(), "Removed separate stderr of previous run"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(RuncachedError::write(&separate, e)),
            }
        }

        let command_path = paths.command();
        tokio::fs::write(&command_path, command)
            .await
            .map_err(|e| RuncachedError::write(&command_path, e))?;

        tokio::fs::write(&staged.exit_code_tmp, exit_code.to_string())
            .await
            .map_err(|e| RuncachedError::write(&staged.exit_code_tmp, e))?;
        rename(&staged.exit_code_tmp, &paths.exit_code()).await?;

        debug!(key = %paths.key(), exit_code, "Published record");
        Ok(())
    }
}

async fn rename(from: &Path, to: &Path) -> RuncachedResult<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| RuncachedError::Publish {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: e.to_string(),
        })
}

async fn read_or_empty(path: &Path) -> Vec<u8> {
    match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cached output unreadable, serving empty");
            Vec::new()
        }
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
