// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The executor thread's main loop

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use super::state::Counters;
use super::{ExecutorState, Shared, StopGuard};
use crate::config::EngineConfig;
use crate::driver::{Connection, Connector, DriverError};
use crate::error::QueryError;
use crate::job::QueryJob;

/// Everything the executor thread owns exclusively
pub(crate) struct Worker {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: Arc<EngineConfig>,
    connection: Option<Box<dyn Connection>>,
    backoff_exponent: u32,
    attempted: bool,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        connector: Arc<dyn Connector>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            shared,
            connector,
            config,
            connection: None,
            backoff_exponent: 0,
            attempted: false,
        }
    }

    pub(crate) fn run(mut self) {
        let _guard = StopGuard(Arc::clone(&self.shared));
        log::info!(
            "Executor started ({} backend, {})",
            self.connector.name(),
            self.config.connection.describe()
        );

        while !self.shared.is_shutdown() {
            if self.connection.is_none() {
                self.connect_cycle();
                continue;
            }
            if let Some(job) = self.shared.next_job(self.config.poll_interval()) {
                if let Some(job) = self.execute(job) {
                    // Lost the connection before the job could take effect
                    self.shared.requeue_front(job);
                    Counters::bump(&self.shared.counters().requeued);
                }
            }
        }

        self.shared.set_state(ExecutorState::ShuttingDown);
        self.drain();
        self.close_connection();
        log::info!("Executor stopped");
    }

    /// One connection attempt, preceded by the backoff sleep on retries
    fn connect_cycle(&mut self) {
        if self.attempted {
            let delay = self.config.backoff_delay(self.backoff_exponent);
            log::info!(
                "Reconnecting in {:?} (backoff exponent {})",
                delay,
                self.backoff_exponent
            );
            if !self.shared.sleep_unless_shutdown(delay) {
                return;
            }
        }
        self.attempted = true;

        self.shared.set_state(ExecutorState::Connecting);
        match self.connector.connect(&self.config.connection) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.set_backoff_exponent(0);
                self.shared.set_state(ExecutorState::Connected);
                Counters::bump(&self.shared.counters().connects);
                log::info!("Connected to {}", self.config.connection.describe());
            }
            Err(e) => {
                self.set_backoff_exponent((self.backoff_exponent + 1).min(self.config.max_backoff_exponent));
                self.shared.set_state(ExecutorState::Disconnected);
                Counters::bump(&self.shared.counters().connect_failures);
                log::warn!("Connection attempt failed: {}", e);
            }
        }
    }

    fn set_backoff_exponent(&mut self, exponent: u32) {
        self.backoff_exponent = exponent;
        self.shared
            .counters()
            .backoff_exponent
            .store(exponent, Ordering::Relaxed);
    }

    /// Run one job
    ///
    /// Finished jobs go to the finished queue. A job interrupted by a
    /// connection loss before it could take effect is handed back instead.
    fn execute(&mut self, mut job: QueryJob) -> Option<QueryJob> {
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Some(job),
        };

        if let Err(error) = job.params().validate() {
            job.fail(error);
            Counters::bump(&self.shared.counters().failed);
            self.shared.finish(job);
            return None;
        }

        job.record_attempt();
        let timeout = job.timeout().unwrap_or_else(|| self.config.query_timeout());
        let started = Instant::now();
        let result = connection.execute(job.sql(), job.params(), timeout);
        let elapsed = started.elapsed();

        if elapsed >= self.config.slow_query_threshold() {
            log::warn!("Slow query ({:?}): {}", elapsed, job.sql());
        }

        match result {
            Ok(result_set) => {
                log::debug!("Job {} completed in {:?}", job.id(), elapsed);
                job.complete(result_set);
                Counters::bump(&self.shared.counters().executed);
                self.shared.finish(job);
                None
            }
            Err(error) if error.is_connection_lost() => {
                self.on_connection_lost(&error);
                if error.effect_possible() {
                    log::warn!(
                        "Job {} interrupted after it may have applied, not retrying",
                        job.id()
                    );
                    job.fail(error.into_query_error());
                    Counters::bump(&self.shared.counters().failed);
                    self.shared.finish(job);
                    None
                } else {
                    log::warn!("Job {} will be retried after reconnect", job.id());
                    Some(job)
                }
            }
            Err(error) => {
                log::debug!("Job {} failed: {}", job.id(), error);
                job.fail(error.into_query_error());
                Counters::bump(&self.shared.counters().failed);
                self.shared.finish(job);
                None
            }
        }
    }

    fn on_connection_lost(&mut self, error: &DriverError) {
        log::warn!("Connection lost: {}", error);
        // The handle is unusable; dropping it releases whatever is left
        self.connection = None;
        self.shared.set_state(ExecutorState::Disconnected);
        Counters::bump(&self.shared.counters().connection_losses);
    }

    /// Finish queued work before the connection closes
    ///
    /// Writes are executed so their effects are not silently lost; reads
    /// are discarded. If the connection fails mid-drain the remaining
    /// writes are abandoned and reported.
    fn drain(&mut self) {
        let jobs = self.shared.take_pending();
        if jobs.is_empty() {
            return;
        }
        log::info!("Draining {} pending job(s) before shutdown", jobs.len());

        let mut discarded = 0usize;
        let mut abandoned = 0usize;
        for mut job in jobs {
            if job.kind().is_read() {
                job.fail(QueryError::Discarded("engine is shutting down".to_string()));
                Counters::bump(&self.shared.counters().discarded);
                self.shared.finish(job);
                discarded += 1;
                continue;
            }

            let mut job = if self.connection.is_some() {
                match self.execute(job) {
                    None => continue,
                    Some(job) => job,
                }
            } else {
                job
            };
            job.fail(QueryError::ConnectionLost(
                "connection unavailable during shutdown, statement not applied".to_string(),
            ));
            Counters::bump(&self.shared.counters().abandoned);
            self.shared.finish(job);
            abandoned += 1;
        }

        if discarded > 0 {
            log::warn!("Discarded {} read job(s) during shutdown", discarded);
        }
        if abandoned > 0 {
            log::error!(
                "Abandoned {} write job(s) during shutdown: connection unavailable, changes were NOT applied",
                abandoned
            );
        }
    }

    fn close_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                log::warn!("Error closing connection: {}", e);
            }
        }
    }
}
