// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Cache key derivation
//!
//! A key is a readable prefix of the command line followed by a hash of the
//! whole command line. XXH3 is used for bucketing only: two commands whose
//! prefixes and 128-bit hashes coincide share a record, and that collision
//! risk is accepted.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use xxhash_rust::xxh3::xxh3_128;

/// Number of command-line characters kept in the readable prefix
pub const PREFIX_CHARS: usize = 30;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9:_,.\-]").expect("Invalid allow-list pattern"));

/// Join program and arguments the way the record stores them
pub fn join_command(args: &[String]) -> String {
    args.join(" ")
}

/// Filesystem-safe identifier of one cached command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a program and its arguments
    pub fn derive(args: &[String]) -> Self {
        Self::from_command_line(&join_command(args))
    }

    /// Derive the key for an already joined command line
    pub fn from_command_line(command: &str) -> Self {
        let head: String = command.chars().take(PREFIX_CHARS).collect();
        let collapsed = WHITESPACE.replace_all(&head, "_");
        let prefix = DISALLOWED.replace_all(&collapsed, "");

        Self(format!("{}-{:032x}", prefix, xxh3_128(command.as_bytes())))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
