// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 runcached contributors

//! Utility modules
//!
//! Common utilities for the runcached CLI.

pub mod colors;

pub use colors::*;
