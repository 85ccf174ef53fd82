// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for QueryLite
//!
//! Provides one-off statement execution and an interactive SQL console,
//! both driving the engine's poll tick from the main thread.

pub mod commands;
pub mod console;
pub mod output;

pub use commands::{Cli, Commands};
pub use console::{handle_console, handle_query, handle_version, EngineOptions};
