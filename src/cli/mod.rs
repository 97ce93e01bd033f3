// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! CLI definitions and mode dispatch
//!
//! One process per invocation. The mode is picked from the flags and the
//! first command token: help, status (dry run), execute (background worker)
//! or normal (serve from cache).

pub mod execute;
pub mod serve;
pub mod status;

use clap::{CommandFactory, Parser, ValueEnum};
use miette::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;
use crate::refresh::EXECUTE_TOKEN;

/// Process exit code for help and usage errors
pub const EXIT_USAGE: i32 = 98;

/// Stale-while-revalidate cache for slow commands
#[derive(Parser, Debug)]
#[clap(
    name = "runcached",
    version,
    about = "Serve the last result of a slow command at once, refreshing it in the background",
    long_about = None,
    disable_help_flag = true,
    after_help = "Examples:\n\
        runcached /usr/lib/nagios/plugins/check_raid      Serve cached result, refresh if due\n\
        runcached -s check_raid                           Show cache status only\n\n\
        Exit codes: the cached command's own code when served, 99 corrupt record,\n\
        100 record too old (refresh pending), 102 no record yet, 98 usage.\n\
        A leading '0' token runs the command in the foreground and updates the cache;\n\
        it is what the background worker is started with."
)]
pub struct Cli {
    /// Print usage and exit with code 98
    #[clap(short = 'h', long = "help")]
    pub help: bool,

    /// Show cache status without refreshing or executing anything
    #[clap(short = 's', long = "status", visible_aliases = ["dryrun", "dry-run"])]
    pub status: bool,

    /// Status output format
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Cache directory
    #[clap(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Minimum seconds between refreshes
    #[clap(long, value_name = "SECS")]
    pub refresh_interval: Option<u64>,

    /// Maximum age in seconds of a result that is still served
    #[clap(long, value_name = "SECS")]
    pub max_age: Option<u64>,

    /// Cache stderr together with stdout in one file
    #[clap(long)]
    pub merge_stderr: bool,

    /// Enable verbose logging on stderr
    #[clap(short, long)]
    pub verbose: bool,

    /// Command to cache, with its arguments
    #[clap(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Output format for the status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Invocation mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Help,
    Status(Vec<String>),
    Execute(Vec<String>),
    Normal(Vec<String>),
}

impl Cli {
    /// Resolve the invocation mode
    pub fn mode(&self) -> Mode {
        if self.help || self.command.is_empty() {
            return Mode::Help;
        }

        if self.status {
            return Mode::Status(self.command.clone());
        }

        match self.command.split_first() {
            Some((first, rest)) if first == EXECUTE_TOKEN => {
                if rest.is_empty() {
                    Mode::Help
                } else {
                    Mode::Execute(rest.to_vec())
                }
            }
            _ => Mode::Normal(self.command.clone()),
        }
    }

    /// Settings with this invocation's overrides applied
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default().with_merge_stderr(self.merge_stderr);

        if let Some(ref dir) = self.cache_dir {
            settings = settings.with_cache_dir(dir);
        }
        if let Some(secs) = self.refresh_interval {
            settings = settings.with_min_refresh_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.max_age {
            settings = settings.with_max_serve_age(Duration::from_secs(secs));
        }

        settings
    }
}

/// Print usage on stderr
pub fn print_usage() {
    eprintln!("{}", Cli::command().render_help());
}

/// Run the resolved mode and return the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let settings = cli.settings();

    match cli.mode() {
        Mode::Help => {
            print_usage();
            Ok(EXIT_USAGE)
        }
        Mode::Status(command) => status::run(command, &settings, cli.format).await,
        Mode::Execute(command) => execute::run(command, &settings).await,
        Mode::Normal(command) => serve::run(command, &settings, cli.verbose).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("runcached").chain(args.iter().copied())).unwrap()
    }

    fn owned(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_is_help() {
        assert_eq!(parse(&[]).mode(), Mode::Help);
        assert_eq!(parse(&["-h"]).mode(), Mode::Help);
        assert_eq!(parse(&["--help"]).mode(), Mode::Help);
    }

    #[test]
    fn test_normal_mode_keeps_command_flags() {
        let cli = parse(&["check_disk", "-w", "10%", "-s", "--help"]);
        assert_eq!(
            cli.mode(),
            Mode::Normal(owned(&["check_disk", "-w", "10%", "-s", "--help"]))
        );
    }

    #[test]
    fn test_status_aliases() {
        for flag in ["-s", "--status", "--dryrun", "--dry-run"] {
            assert_eq!(
                parse(&[flag, "echo", "hi"]).mode(),
                Mode::Status(owned(&["echo", "hi"])),
                "{flag}"
            );
        }
    }

    #[test]
    fn test_execute_token() {
        assert_eq!(
            parse(&["0", "echo", "hi"]).mode(),
            Mode::Execute(owned(&["echo", "hi"]))
        );
        assert_eq!(parse(&["0"]).mode(), Mode::Help);
    }

    #[test]
    fn test_worker_invocation_parses() {
        let cli = parse(&["--cache-dir", "/c", "--merge-stderr", "0", "ls", "-la"]);
        assert_eq!(cli.mode(), Mode::Execute(owned(&["ls", "-la"])));

        let settings = cli.settings();
        assert_eq!(settings.cache_dir, PathBuf::from("/c"));
        assert!(settings.merge_stderr);
    }

    #[test]
    fn test_threshold_overrides() {
        let settings = parse(&["--refresh-interval", "5", "--max-age", "60", "true"]).settings();
        assert_eq!(settings.min_refresh_interval, Duration::from_secs(5));
        assert_eq!(settings.max_serve_age, Duration::from_secs(60));
    }

    #[test]
    fn test_json_format() {
        let cli = parse(&["-s", "--format", "json", "true"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
