// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for QueryLite

use std::time::Duration;
use thiserror::Error;

use crate::deferred::DeferredState;

/// Result type alias for query outcomes
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Reason a submitted query was rejected
///
/// This is the error side of every `Deferred<ResultSet, QueryError>` handed
/// out by the engine. Query-level errors are never retried by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Statement failed to prepare or execute (syntax, constraint, ...)
    #[error("Query failed: {0}")]
    Execution(String),

    /// Parameter binding failed
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Statement ran longer than the per-query ceiling
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Connection dropped after the statement may already have applied,
    /// or the job was abandoned during shutdown
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Bounded pending queue refused the job
    #[error("Pending queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Read job dropped by the shutdown drain
    #[error("Query discarded: {0}")]
    Discarded(String),
}

/// Returned when `resolve` or `reject` is called on a settled deferred
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleError {
    #[error("Deferred result already settled ({state:?})")]
    AlreadySettled { state: DeferredState },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
