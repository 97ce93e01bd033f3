// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Status command - inspect a record without side effects
//!
//! Never creates the cache directory, never launches a refresh and never
//! runs the command.

use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

use super::OutputFormat;
use crate::cache::{join_command, CacheKey, CacheStore, ExitCodeState};
use crate::config::Settings;
use crate::errors::RuncachedError;
use crate::refresh::{read_ages, Age, Ages, RefreshCoordinator, ServeDecision};
use crate::utils::colors;

/// Files making up one record
#[derive(Debug, Clone, Serialize)]
pub struct RecordFiles {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub exit_code: PathBuf,
    pub command: PathBuf,
    pub caller_marker: PathBuf,
    pub start_marker: PathBuf,
    pub worker_marker: PathBuf,
    pub lock: PathBuf,
}

/// Everything a normal call would base its decisions on
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub command: String,
    pub key: String,
    pub cache_dir: PathBuf,
    pub files: RecordFiles,
    pub min_refresh_interval_secs: u64,
    pub max_serve_age_secs: u64,
    pub ages: Ages,
    pub exit_code: ExitCodeState,
    pub refresh_due: bool,
    pub refresh_locked: bool,
    pub decision: ServeDecision,
}

/// Collect the status of `command`'s record
pub async fn inspect(command: &[String], settings: &Settings) -> StatusReport {
    let store = CacheStore::view(settings);
    let key = CacheKey::derive(command);
    let paths = store.paths(&key);

    let coordinator = RefreshCoordinator::new(settings);
    let ages = read_ages(&store, &paths, SystemTime::now()).await;
    let exit_code = store.read_exit_code(&paths).await;
    let decision = coordinator.staleness().serve(&ages, &exit_code);

    StatusReport {
        command: join_command(command),
        key: key.to_string(),
        cache_dir: store.dir().to_path_buf(),
        files: RecordFiles {
            stdout: paths.stdout(),
            stderr: paths.stderr(),
            exit_code: paths.exit_code(),
            command: paths.command(),
            caller_marker: paths.caller_marker(),
            start_marker: paths.start_marker(),
            worker_marker: paths.worker_marker(),
            lock: paths.lock(),
        },
        min_refresh_interval_secs: settings.min_refresh_interval.as_secs(),
        max_serve_age_secs: settings.max_serve_age.as_secs(),
        refresh_due: coordinator.staleness().refresh_due(&ages),
        refresh_locked: paths.lock().exists(),
        ages,
        exit_code,
        decision,
    }
}

/// Run the status command
pub async fn run(command: Vec<String>, settings: &Settings, format: OutputFormat) -> Result<i32> {
    let report = inspect(&command, settings).await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(RuncachedError::from)?;
            println!("{json}");
        }
        OutputFormat::Text => print_text(&report),
    }

    Ok(0)
}

fn print_text(report: &StatusReport) {
    colors::configure_colors();

    colors::print_header("Cache Status (dry run, nothing executed)");
    colors::print_field("Command", &report.command);
    colors::print_field("Key", &report.key);
    colors::print_field("Directory", report.cache_dir.display());

    colors::print_section("Files");
    let files = &report.files;
    colors::print_field("stdout", files.stdout.display());
    if files.stderr != files.stdout {
        colors::print_field("stderr", files.stderr.display());
    }
    colors::print_field("exit code", files.exit_code.display());
    colors::print_field("command", files.command.display());
    colors::print_field("caller pid", files.caller_marker.display());
    colors::print_field("refresh pid", files.start_marker.display());
    colors::print_field("worker pid", files.worker_marker.display());
    colors::print_field("lock", files.lock.display());

    colors::print_section("Ages");
    colors::print_field(
        "completed",
        format!("{} (served up to {}s)", ago(report.ages.complete), report.max_serve_age_secs),
    );
    colors::print_field(
        "refreshed",
        format!("{} (every {}s at most)", ago(report.ages.start), report.min_refresh_interval_secs),
    );

    colors::print_section("Decision");
    let refresh = if report.refresh_locked {
        colors::warning("locked by another caller")
    } else if report.refresh_due {
        colors::warning("would launch")
    } else {
        colors::dimmed("not due")
    };
    colors::print_field("refresh", refresh);

    let serve = match &report.decision {
        ServeDecision::Serve { exit_code } => {
            colors::success(&format!("servable, exit code {exit_code}"))
        }
        ServeDecision::Corrupt { error } => colors::error(&format!("corrupt exit code file: {error}")),
        ServeDecision::Expired => colors::warning("too old to serve"),
        ServeDecision::NoRecord => colors::warning("no record yet"),
    };
    colors::print_field("serve", serve);
    colors::print_field("would exit", report.decision.exit_code());
}

fn ago(age: Age) -> String {
    match age.secs() {
        Some(secs) => format!("{secs}s ago"),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_inspect_has_no_side_effects() {
        let temp_dir = TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join("never-created");
        let settings = Settings::default().with_cache_dir(&cache_dir);

        let report = inspect(&["echo".to_string(), "hi".to_string()], &settings).await;

        assert!(!cache_dir.exists());
        assert_eq!(report.command, "echo hi");
        assert!(report.refresh_due);
        assert!(!report.refresh_locked);
        assert_eq!(report.decision, ServeDecision::NoRecord);
    }

    #[tokio::test]
    async fn test_inspect_sees_published_record() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::default().with_cache_dir(temp_dir.path());
        let command = vec!["echo".to_string(), "hi".to_string()];

        let store = CacheStore::open(&settings).unwrap();
        let paths = store.paths(&CacheKey::derive(&command));
        std::fs::write(paths.stdout(), "hi\n").unwrap();
        std::fs::write(paths.exit_code(), "0").unwrap();

        let report = inspect(&command, &settings).await;
        assert_eq!(report.decision, ServeDecision::Serve { exit_code: 0 });
        assert!(!report.refresh_due);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["decision"]["decision"], "serve");
        assert_eq!(json["exit_code"]["state"], "present");
    }
}
