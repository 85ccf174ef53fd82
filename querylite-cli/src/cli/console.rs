// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for QueryLite

use colored::Colorize;
use rustyline::{error::ReadlineError, CompletionType, Config, EditMode, Editor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::commands::OutputFormat;
use super::output::ResultFormatter;
use querylite::{
    BackendType, DeferredResultSet, Engine, EngineConfig, ParamValue, Params, ResultSet,
};

/// How often the CLI drives `Engine::tick` while waiting for a result
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Connection settings gathered from the global flags
pub struct EngineOptions {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub backend: Option<BackendType>,
}

impl EngineOptions {
    /// Configuration file first, then flag overrides
    fn load(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
            None => EngineConfig::default(),
        };
        if let Some(database) = &self.database {
            config.connection.database = database.to_string_lossy().into_owned();
        }
        if let Some(backend) = self.backend {
            config.connection.backend = backend;
        }
        Ok(config)
    }

    fn start_engine(&self) -> Result<Engine, Box<dyn std::error::Error>> {
        let engine = Engine::new(self.load()?)?;
        engine.connect()?;
        Ok(engine)
    }
}

/// Tick the engine until `deferred` settles
///
/// Gives up if the executor has never managed to connect, since the job
/// would otherwise wait out the reconnect backoff indefinitely.
fn run_until_settled(
    engine: &Engine,
    deferred: &DeferredResultSet,
) -> Result<Arc<ResultSet>, Box<dyn std::error::Error>> {
    loop {
        engine.tick();
        match deferred.outcome() {
            Some(Ok(result)) => return Ok(result),
            Some(Err(e)) => return Err(e.to_string().into()),
            None => {}
        }
        let stats = engine.stats();
        if stats.connects == 0 && stats.connect_failures > 0 {
            return Err(format!(
                "Could not connect to {}",
                engine.config().connection.describe()
            )
            .into());
        }
        std::thread::sleep(TICK_INTERVAL);
    }
}

/// Handle the query command (one-off statement execution)
pub fn handle_query(
    options: &EngineOptions,
    sql: String,
    params: Vec<String>,
    format: OutputFormat,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = options.start_engine()?;
    let params: Params = params.iter().map(|p| ParamValue::infer(p)).collect();

    let deferred = match timeout_ms {
        Some(ms) => engine.submit_with_timeout(&sql, params, Duration::from_millis(ms)),
        None => engine.submit(&sql, params),
    };
    let outcome = run_until_settled(&engine, &deferred);
    engine.disconnect();

    let result = outcome?;
    println!("{}", ResultFormatter::format(&result, format));
    Ok(())
}

/// Handle the console (REPL) command
pub fn handle_console(options: &EngineOptions) -> Result<(), Box<dyn std::error::Error>> {
    let engine = options.start_engine()?;

    println!("{}", "QueryLite".bold().green());
    println!("Type 'help' for commands, 'exit' or 'quit' to exit");
    println!("Multi-line statements supported - use ';' to terminate");
    println!(
        "{}",
        format!("Connected to {}", engine.config().connection.describe()).cyan()
    );

    let config = Config::builder()
        .edit_mode(EditMode::Emacs)
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .auto_add_history(false)
        .build();

    let mut rl = Editor::<(), _>::with_config(config)?;

    let history_path = ".querylite/history.txt";
    if let Some(parent) = Path::new(history_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.load_history(history_path);

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            format!("{}> ", "sql".cyan())
        } else {
            format!("{}> ", "...".cyan())
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if !buffer.is_empty() {
                    buffer.clear();
                    println!("{}", "\nStatement buffer cleared".yellow());
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let trimmed = line.trim();

        if buffer.is_empty() {
            match trimmed.to_lowercase().as_str() {
                "exit" | "quit" => {
                    println!("{}", "Goodbye!".green());
                    break;
                }
                "help" => {
                    print_help();
                    continue;
                }
                "status" => {
                    print_status(&engine);
                    continue;
                }
                "" => continue,
                _ => {}
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');

        if trimmed.ends_with(';') {
            let sql = buffer.trim().to_string();
            buffer.clear();
            rl.add_history_entry(&sql)?;

            let deferred = engine.submit(&sql, Params::new());
            match run_until_settled(&engine, &deferred) {
                Ok(result) => println!("{}", ResultFormatter::format(&result, OutputFormat::Table)),
                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
            }
        }
    }

    let _ = rl.save_history(history_path);

    if !engine.disconnect() {
        eprintln!("{}", "Executor did not stop cleanly; queued work may be lost".red());
    }
    Ok(())
}

/// Handle the version command
pub fn handle_version() {
    println!("{} {}", "querylite".bold().green(), env!("CARGO_PKG_VERSION"));
    println!("  Backends: sqlite (bundled), memory");
    println!("  Platform: {}-{}", std::env::consts::OS, std::env::consts::ARCH);
}

fn print_status(engine: &Engine) {
    let stats = engine.stats();
    println!("{}", "Executor status:".bold().green());
    println!("  State:              {}", engine.state());
    println!("  Pending jobs:       {}", engine.pending_len());
    println!("  Executed:           {}", stats.executed);
    println!("  Failed:             {}", stats.failed);
    println!("  Requeued:           {}", stats.requeued);
    println!("  Connects:           {}", stats.connects);
    println!("  Connect failures:   {}", stats.connect_failures);
    println!("  Connection losses:  {}", stats.connection_losses);
    println!("  Backoff exponent:   {}", stats.backoff_exponent);
}

/// Print help message
fn print_help() {
    println!("{}", "Available commands:".bold().green());
    println!("  {}  - Show this help message", "help".cyan());
    println!("  {}  - Show executor state and counters", "status".cyan());
    println!("  {}  - Exit the console", "exit/quit".cyan());
    println!("\n{}", "Statement syntax:".bold().green());
    println!("  Multi-line statements are supported");
    println!("  Terminate statements with semicolon (;)");
    println!("\n{}", "Examples:".bold().green());
    println!("  {}", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);".yellow());
    println!("  {}", "INSERT INTO users (name) VALUES ('Alice');".yellow());
    println!("  {}", "SELECT * FROM users;".yellow());
}
