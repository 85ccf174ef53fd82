// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Raw connection abstraction used by the executor thread
//!
//! A [`Connector`] opens connections from the engine's
//! [`ConnectionConfig`]; a [`Connection`] runs one statement at a time and
//! returns a fully materialized [`ResultSet`]. Only the executor thread
//! ever touches a live `Connection`.

mod error;
pub mod sqlite;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use error::{DriverError, DriverResult};
pub use sqlite::SqliteConnector;

use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::job::Params;
use crate::result::ResultSet;

/// A live database connection
pub trait Connection: Send {
    /// Run `sql` with `params` bound positionally, bounded by `timeout`
    ///
    /// Row-producing statements are read to completion before returning.
    fn execute(&mut self, sql: &str, params: &Params, timeout: Duration) -> DriverResult<ResultSet>;

    /// Release the connection
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// Factory for [`Connection`]s
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> DriverResult<Box<dyn Connection>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
