// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! QueryLite CLI entry point

mod cli;

use clap::Parser;
use colored::Colorize;
use cli::{handle_console, handle_query, handle_version, Cli, Commands, EngineOptions};

fn main() {
    let cli = Cli::parse();

    // --verbose wins over --log-level; RUST_LOG applies when neither is given
    let level = if cli.verbose {
        Some(log::LevelFilter::Debug)
    } else {
        cli.log_level.map(|level| level.to_level_filter())
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();

    let options = EngineOptions {
        config: cli.config,
        database: cli.database,
        backend: cli.backend,
    };

    let result = match cli.command {
        Commands::Version => {
            handle_version();
            Ok(())
        }
        Commands::Query {
            sql,
            params,
            format,
            timeout_ms,
        } => handle_query(&options, sql, params, format, timeout_ms),
        Commands::Console => handle_console(&options),
    };

    if let Err(e) = result {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}
