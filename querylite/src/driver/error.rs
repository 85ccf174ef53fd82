// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Driver-level errors and their classification

use std::time::Duration;
use thiserror::Error;

use crate::error::QueryError;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Failure reported by a [`super::Connection`] or [`super::Connector`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The connection is gone and must be re-established
    ///
    /// `effect_possible` is set when the statement had started executing
    /// and may already have changed data; such jobs are not retried.
    #[error("Connection lost: {message}")]
    ConnectionLost {
        message: String,
        effect_possible: bool,
    },

    /// Opening a connection failed
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Statement exceeded its execution ceiling
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    /// Parameter could not be bound
    #[error("Bind failed: {0}")]
    Bind(String),

    /// Any other statement failure
    #[error("{0}")]
    Query(String),
}

impl DriverError {
    /// Recoverable by reconnecting
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DriverError::ConnectionLost { .. })
    }

    pub fn effect_possible(&self) -> bool {
        matches!(
            self,
            DriverError::ConnectionLost {
                effect_possible: true,
                ..
            }
        )
    }

    /// The rejection reported to the submitter
    pub fn into_query_error(self) -> QueryError {
        match self {
            DriverError::ConnectionLost { message, .. } => QueryError::ConnectionLost(message),
            DriverError::Connect(message) => QueryError::ConnectionLost(message),
            DriverError::Timeout(limit) => QueryError::Timeout(limit),
            DriverError::Bind(message) => QueryError::InvalidParameter(message),
            DriverError::Query(message) => QueryError::Execution(message),
        }
    }
}
