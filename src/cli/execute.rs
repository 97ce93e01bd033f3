// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Execute mode - run the command and publish a fresh record
//!
//! Normally only reached through the background worker, whose exit code
//! nobody collects.

use miette::Result;

use crate::cache::{CacheKey, CacheStore};
use crate::config::Settings;
use crate::errors::RuncachedError;
use crate::executors::{refresh_record, Executor, ShellExecutor};

/// Run `command` into its cache record and return the command's exit code
pub async fn run(command: Vec<String>, settings: &Settings) -> Result<i32> {
    let executor = ShellExecutor::new(&settings.shell);
    if !executor.check_available().await? {
        return Err(RuncachedError::ToolExecutionFailed {
            shell: settings.shell.clone(),
            error: "not found or not executable".to_string(),
            help: Some("The previous cached result is left untouched".into()),
        }
        .into());
    }

    let store = CacheStore::open(settings)?;
    let paths = store.paths(&CacheKey::derive(&command));

    let result = refresh_record(&store, &paths, &executor, &command).await?;

    Ok(result.exit_code)
}
