// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command definitions for QueryLite

use clap::{Parser, Subcommand, ValueEnum};
use querylite::BackendType;
use std::path::PathBuf;

/// Log level options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    Info,
    /// Debug messages and above (verbose)
    Debug,
    /// All messages including trace (very verbose)
    Trace,
    /// Disable all logging
    Off,
}

impl LogLevel {
    /// Convert to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// QueryLite CLI - SQL over a background connection
#[derive(Parser)]
#[command(name = "querylite")]
#[command(about = "QueryLite - non-blocking SQL with deferred results")]
#[command(version)]
pub struct Cli {
    /// Database file (overrides the configuration file)
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<PathBuf>,

    /// Backend driver (sqlite, memory)
    #[arg(short = 'b', long = "backend", global = true)]
    pub backend: Option<BackendType>,

    /// JSON engine configuration file
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace, off)
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose mode (equivalent to --log-level debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show detailed version information
    Version,

    /// Execute a single SQL statement
    Query {
        /// The SQL statement to execute
        sql: String,

        /// Positional parameter, bound in order (repeatable)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Per-statement timeout in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Interactive SQL console (REPL)
    Console,
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_command_parsing() {
        let cli = Cli::parse_from([
            "querylite",
            "--backend",
            "memory",
            "query",
            "SELECT ?, ?",
            "--param",
            "1",
            "-p",
            "two",
            "--format",
            "json",
        ]);
        assert_eq!(cli.backend, Some(BackendType::Memory));
        match cli.command {
            Commands::Query {
                sql,
                params,
                format,
                timeout_ms,
            } => {
                assert_eq!(sql, "SELECT ?, ?");
                assert_eq!(params, vec!["1", "two"]);
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(timeout_ms, None);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["querylite", "console", "-v", "--database", "app.db"]);
        assert!(cli.verbose);
        assert_eq!(cli.database, Some(PathBuf::from("app.db")));
        assert!(matches!(cli.command, Commands::Console));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!("csv".parse::<OutputFormat>().is_err());
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
    }
}
