// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine façade held by callers
//!
//! The engine is used from a single caller thread:
//! - `submit` enqueues a job and returns its deferred result immediately
//! - `tick`, called on a steady cadence, settles every finished job
//!
//! Deferreds are settled only inside `tick`, so completion handlers never
//! run concurrently with each other or on the executor thread.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::driver::{Connector, SqliteConnector};
use crate::error::{ConfigError, QueryError};
use crate::executor::{ConnectionExecutor, EnqueueError, ExecutorState, ExecutorStats};
use crate::job::{DeferredResultSet, Params, QueryJob};

/// Submission and poll-tick entry point over one background connection
pub struct Engine {
    config: Arc<EngineConfig>,
    executor: ConnectionExecutor,
}

impl Engine {
    /// Engine over the built-in SQLite driver
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, Arc::new(SqliteConnector::new()))
    }

    /// Engine over a caller-supplied driver
    pub fn with_connector(
        config: EngineConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            executor: ConnectionExecutor::new(Arc::clone(&config), connector),
            config,
        })
    }

    /// Queue `sql` for execution
    ///
    /// Never blocks (unless the queue is bounded with the blocking overflow
    /// policy). The returned deferred settles during a later `tick`.
    pub fn submit(&self, sql: &str, params: Params) -> DeferredResultSet {
        self.submit_job(QueryJob::new(sql, params))
    }

    /// `submit` with a per-query execution ceiling
    pub fn submit_with_timeout(
        &self,
        sql: &str,
        params: Params,
        timeout: Duration,
    ) -> DeferredResultSet {
        self.submit_job(QueryJob::new(sql, params).with_timeout(timeout))
    }

    /// Queue a prepared job
    pub fn submit_job(&self, job: QueryJob) -> DeferredResultSet {
        let deferred = job.deferred();
        if let Err(EnqueueError { job, capacity }) = self.executor.enqueue(job) {
            let mut job = *job;
            job.fail(QueryError::QueueFull { capacity });
            if let Err(e) = job.settle() {
                log::error!("Rejected job was already settled: {}", e);
            }
        }
        deferred
    }

    /// Settle every job that finished since the last tick
    ///
    /// Safe to call with nothing finished. Returns how many deferreds were
    /// settled. Jobs finishing while the tick runs wait for the next one.
    pub fn tick(&self) -> usize {
        let available = self.executor.finished_len();
        let mut settled = 0;
        for _ in 0..available {
            let Some(job) = self.executor.poll_finished() else {
                break;
            };
            let id = job.id();
            if let Err(e) = job.settle() {
                log::error!("Job {} settled twice: {}", id, e);
            }
            settled += 1;
        }
        settled
    }

    /// Start the executor thread, which connects in the background
    pub fn connect(&self) -> std::io::Result<()> {
        log::info!("Starting engine ({})", self.config.connection.describe());
        self.executor.start()
    }

    /// Stop the executor thread and settle what it finished
    ///
    /// Blocks until the executor has drained and closed its connection, or
    /// until `shutdown_timeout` elapses. Returns false in the latter case;
    /// any work still queued at that point may be lost.
    pub fn disconnect(&self) -> bool {
        if !self.executor.is_running() {
            self.tick();
            return true;
        }
        let timeout = self.config.shutdown_timeout();
        let stopped = self.executor.stop(timeout);
        if !stopped {
            log::error!(
                "Executor did not stop within {:?}; {} pending job(s) may be lost",
                timeout,
                self.executor.pending_len()
            );
        }
        self.tick();
        stopped
    }

    pub fn state(&self) -> ExecutorState {
        self.executor.state()
    }

    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.executor.stats()
    }

    pub fn pending_len(&self) -> usize {
        self.executor.pending_len()
    }

    pub fn finished_len(&self) -> usize {
        self.executor.finished_len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.executor.is_running() {
            self.disconnect();
        }
    }
}
