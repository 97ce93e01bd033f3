// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Terminal color utilities
//!
//! Only the status report is colored; served output is passed through
//! byte for byte.

use colored::Colorize;
use std::io::IsTerminal;

/// Disable colors when stdout is not a terminal or NO_COLOR is set
pub fn configure_colors() {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Style for success messages
pub fn success(msg: &str) -> colored::ColoredString {
    msg.green()
}

/// Style for error messages
pub fn error(msg: &str) -> colored::ColoredString {
    msg.red()
}

/// Style for warning messages
pub fn warning(msg: &str) -> colored::ColoredString {
    msg.yellow()
}

/// Style for dimmed/secondary text
pub fn dimmed(msg: &str) -> colored::ColoredString {
    msg.dimmed()
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print an aligned label/value line
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", format!("{label}:"), value);
}
