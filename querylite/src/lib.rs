// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! QueryLite - non-blocking SQL submission over a single background connection
//!
//! Callers submit SQL and get a [`Deferred`] back immediately. A dedicated
//! executor thread owns the database connection, runs jobs one at a time,
//! and reconnects with exponential backoff when the connection drops.
//! Results travel back through a finished queue and are delivered when the
//! caller drives [`Engine::tick`].
//!
//! # Quick Start
//!
//! ```no_run
//! use querylite::{params, Engine, EngineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(EngineConfig::sqlite("./app.db"))?;
//! engine.connect()?;
//!
//! let users = engine.submit("SELECT id, name FROM users WHERE id > ?", params![10]);
//! users.then(
//!     |rs| println!("{} user(s)", rs.len()),
//!     |err| eprintln!("lookup failed: {}", err),
//! );
//!
//! // Typically once per frame or loop iteration
//! engine.tick();
//! # engine.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//!  caller thread                         executor thread
//! ┌──────────────┐   pending queue    ┌─────────────────────┐
//! │ Engine       │ ─────────────────▶ │ ConnectionExecutor  │
//! │  submit()    │                    │  connect / backoff  │
//! │  tick()      │ ◀───────────────── │  execute / requeue  │
//! └──────────────┘   finished queue   └─────────────────────┘
//!        │                                      │
//!        ▼                                      ▼
//!   Deferred handlers                    Connection (driver)
//! ```
//!
//! # Module Organization
//!
//! - [`deferred`] - single-settle results and the `race`/`all` combinators
//! - [`job`] - query jobs, parameters and reusable templates
//! - [`executor`] - the background thread and its queues
//! - [`driver`] - connection traits and the SQLite driver
//! - [`result`] - materialized result sets and rows
//! - [`config`] - engine and connection configuration
//! - [`error`] - error types

pub mod config;
pub mod deferred;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod job;
pub mod result;

pub use config::{BackendType, ConnectionConfig, EngineConfig, OverflowPolicy, QueueConfig};
pub use deferred::{CompletionHandler, Deferred, DeferredState};
pub use driver::{Connection, Connector, DriverError, SqliteConnector};
pub use engine::Engine;
pub use error::{ConfigError, QueryError, QueryResult, SettleError};
pub use executor::{ConnectionExecutor, EnqueueError, ExecutorState, ExecutorStats};
pub use job::{DeferredResultSet, ParamValue, Params, QueryJob, QueryKind, QueryTemplate};
pub use result::{ColumnIndex, ColumnRef, FieldValue, ResultSet, Row};
