// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Normal mode - answer from the cache, refreshing in the background

use miette::Result;
use std::io::{self, Write};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore, CachedOutput};
use crate::config::Settings;
use crate::errors::RuncachedError;
use crate::refresh::{
    read_ages, read_completion, Ages, RefreshCoordinator, RefreshLauncher, RefreshOutcome,
    ServeDecision,
};

/// Serve the cached result of `command` and return the exit code to use
pub async fn run(command: Vec<String>, settings: &Settings, verbose: bool) -> Result<i32> {
    let store = CacheStore::open(settings)?;
    let key = CacheKey::derive(&command);
    let paths = store.paths(&key);

    if let Err(e) = store
        .touch_marker(&paths.caller_marker(), std::process::id())
        .await
    {
        warn!(error = %e, "Could not update caller marker");
    }

    let ages = read_ages(&store, &paths, SystemTime::now()).await;
    debug!(%key, complete = %ages.complete, start = %ages.start, "Cache ages");

    let coordinator = RefreshCoordinator::new(settings);
    if coordinator.staleness().refresh_due(&ages) {
        let outcome = match RefreshLauncher::current(settings, verbose) {
            Ok(launcher) => {
                coordinator
                    .refresh_if_due(&store, &paths, &ages, &launcher, &command)
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(RefreshOutcome::Launched { pid }) => debug!(pid, "Refresh launched"),
            Ok(other) => debug!(?other, "No refresh launched"),
            // serving must not depend on the launch
            Err(e) => warn!(error = %e, "Background refresh not launched"),
        }
    }

    // a worker may have published while we were deciding on the refresh
    let (exit_code, complete) = read_completion(&store, &paths, SystemTime::now()).await;
    let ages = Ages { complete, ..ages };
    let decision = coordinator.staleness().serve(&ages, &exit_code);

    match &decision {
        ServeDecision::Serve { .. } => {
            let output = store.read_output(&paths).await;
            emit(&output).map_err(RuncachedError::from)?;
        }
        ServeDecision::Corrupt { error } => {
            eprintln!(
                "Could not read exit code from '{}': {}",
                paths.exit_code().display(),
                error
            );
        }
        ServeDecision::Expired => {
            eprintln!("WARNING - waiting for cache refresh, cached result is too old to serve");
        }
        ServeDecision::NoRecord => {
            eprintln!("WARNING - no cached result yet, waiting for the first refresh");
        }
    }

    Ok(decision.exit_code())
}

/// Write cached output to our own stdout and stderr
fn emit(output: &CachedOutput) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(&output.stdout)?;
    stdout.flush()?;

    let mut stderr = io::stderr().lock();
    stderr.write_all(&output.stderr)?;
    stderr.flush()
}
