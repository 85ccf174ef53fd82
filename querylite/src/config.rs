// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine configuration
//!
//! Connection parameters are read once when the engine is built and never
//! change afterwards. Every field has a default, so a partial JSON document
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Which driver backs the connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// SQLite database file at `database`
    #[default]
    Sqlite,

    /// Private in-memory SQLite database, lost on reconnect
    Memory,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(BackendType::Sqlite),
            "memory" => Ok(BackendType::Memory),
            _ => Err(format!(
                "Unknown backend type: {}. Valid options: sqlite, memory",
                s
            )),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendType::Sqlite => "sqlite",
            BackendType::Memory => "memory",
        };
        write!(f, "{}", name)
    }
}

/// Connection parameters
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub backend: BackendType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Logical database name; the file path for SQLite
    pub database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            host: "localhost".to_string(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: "querylite.db".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Log-safe description, never includes the password
    pub fn describe(&self) -> String {
        match self.backend {
            BackendType::Memory => "memory".to_string(),
            BackendType::Sqlite if self.username.is_empty() => {
                format!("sqlite:{}", self.database)
            }
            BackendType::Sqlite => format!(
                "sqlite:{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// What `enqueue` does when a bounded pending queue is full
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Reject the job with `QueryError::QueueFull`
    #[default]
    Reject,
    /// Block the submitting thread until space frees up
    Block,
}

/// Pending queue bound
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct QueueConfig {
    /// `None` leaves the queue unbounded
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub connection: ConnectionConfig,
    /// Ceiling for a single statement
    pub query_timeout_ms: u64,
    /// Reconnect delay is `reconnect_base_delay * 2^exponent`
    pub reconnect_base_delay_ms: u64,
    /// Cap on the backoff exponent
    pub max_backoff_exponent: u32,
    /// How long the executor waits for work before re-checking the connection
    pub poll_interval_ms: u64,
    /// How long `disconnect` waits for the executor thread
    pub shutdown_timeout_ms: u64,
    /// Statements slower than this are logged
    pub slow_query_threshold_ms: u64,
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            query_timeout_ms: 10_000,
            reconnect_base_delay_ms: 1_000,
            max_backoff_exponent: 7,
            poll_interval_ms: 1_000,
            shutdown_timeout_ms: 30_000,
            slow_query_threshold_ms: 1_000,
            queue: QueueConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration over a private in-memory database
    pub fn in_memory() -> Self {
        Self::default().with_backend(BackendType::Memory)
    }

    /// Default configuration over a SQLite file
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        let mut config = Self::default().with_backend(BackendType::Sqlite);
        config.connection.database = path.as_ref().to_string_lossy().into_owned();
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("query_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.max_backoff_exponent > 16 {
            return Err(ConfigError::Invalid(format!(
                "max_backoff_exponent {} exceeds 16",
                self.max_backoff_exponent
            )));
        }
        if self.queue.capacity == Some(0) {
            return Err(ConfigError::Invalid("queue capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.connection.backend = backend;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay_ms = duration_ms(delay);
        self
    }

    pub fn with_max_backoff_exponent(mut self, exponent: u32) -> Self {
        self.max_backoff_exponent = exponent;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold_ms = duration_ms(threshold);
        self
    }

    pub fn with_queue(mut self, capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        self.queue = QueueConfig { capacity, overflow };
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }

    /// Delay before a reconnect attempt at `exponent`
    pub fn backoff_delay(&self, exponent: u32) -> Duration {
        let exponent = exponent.min(self.max_backoff_exponent);
        Duration::from_millis(self.reconnect_base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
