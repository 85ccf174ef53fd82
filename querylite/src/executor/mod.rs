// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Background query execution over a single connection
//!
//! The [`ConnectionExecutor`] owns a dedicated thread that:
//! - opens the connection, reconnecting with exponential backoff
//! - takes jobs from the pending queue one at a time
//! - runs each job against the live connection under a timeout
//! - moves finished jobs to the finished queue
//!
//! `enqueue` and `poll_finished` are the only points of contact with other
//! threads. The live connection and the backoff exponent never leave the
//! executor thread.

mod state;
mod worker;

pub use state::{ExecutorState, ExecutorStats};

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::{EngineConfig, OverflowPolicy};
use crate::driver::Connector;
use crate::job::QueryJob;
use state::{Counters, StateCell};
use worker::Worker;

/// Job refused by a full, rejecting pending queue
#[derive(Debug)]
pub struct EnqueueError {
    pub job: Box<QueryJob>,
    pub capacity: usize,
}

/// State shared between the executor handle and its thread
pub(crate) struct Shared {
    pending: Mutex<VecDeque<QueryJob>>,
    /// Signalled on enqueue and on shutdown
    job_ready: Condvar,
    /// Signalled whenever the pending queue shrinks
    space_ready: Condvar,
    finished: Mutex<VecDeque<QueryJob>>,
    shutdown: AtomicBool,
    running: Mutex<bool>,
    stopped: Condvar,
    state: StateCell,
    counters: Counters,
    next_job_id: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            job_ready: Condvar::new(),
            space_ready: Condvar::new(),
            finished: Mutex::new(VecDeque::new()),
            shutdown: AtomicBool::new(false),
            running: Mutex::new(false),
            stopped: Condvar::new(),
            state: StateCell::new(),
            counters: Counters::default(),
            next_job_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for a pending job
    pub(crate) fn next_job(&self, timeout: Duration) -> Option<QueryJob> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while pending.is_empty() && !self.is_shutdown() {
            if self.job_ready.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        if self.is_shutdown() {
            return None;
        }
        let job = pending.pop_front();
        if job.is_some() {
            self.space_ready.notify_all();
        }
        job
    }

    /// Put a job back at the head of the queue
    pub(crate) fn requeue_front(&self, job: QueryJob) {
        self.pending.lock().push_front(job);
        self.job_ready.notify_one();
    }

    pub(crate) fn take_pending(&self) -> Vec<QueryJob> {
        let jobs = self.pending.lock().drain(..).collect();
        self.space_ready.notify_all();
        jobs
    }

    pub(crate) fn finish(&self, job: QueryJob) {
        self.finished.lock().push_back(job);
    }

    /// Sleep for `delay` unless shutdown is requested first
    ///
    /// Returns false when woken by shutdown.
    pub(crate) fn sleep_unless_shutdown(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut pending = self.pending.lock();
        while !self.is_shutdown() {
            if self.job_ready.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        !self.is_shutdown()
    }

    pub(crate) fn set_state(&self, state: ExecutorState) {
        self.state.set(state);
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    fn mark_stopped(&self) {
        self.state.set(ExecutorState::Disconnected);
        *self.running.lock() = false;
        self.stopped.notify_all();
    }
}

/// Marks the executor stopped when the thread exits, panics included
pub(crate) struct StopGuard(pub(crate) Arc<Shared>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Handle to the background executor
pub struct ConnectionExecutor {
    config: Arc<EngineConfig>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionExecutor {
    pub fn new(config: Arc<EngineConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            shared: Arc::new(Shared::new()),
            handle: Mutex::new(None),
        }
    }

    /// Hand a job to the executor
    ///
    /// Never blocks unless the queue is bounded with `OverflowPolicy::Block`.
    /// A blocking enqueue falls back to rejection while the executor thread
    /// is not running, since nothing would ever make room.
    pub fn enqueue(&self, mut job: QueryJob) -> Result<(), EnqueueError> {
        job.assign_id(self.shared.next_job_id.fetch_add(1, Ordering::Relaxed));
        log::debug!("Queueing job {}: {}", job.id(), job.sql());

        let mut pending = self.shared.pending.lock();
        if let Some(capacity) = self.config.queue.capacity {
            while pending.len() >= capacity {
                let can_wait = self.config.queue.overflow == OverflowPolicy::Block
                    && self.is_running()
                    && !self.shared.is_shutdown();
                if !can_wait {
                    log::debug!("Pending queue full ({}), rejecting job {}", capacity, job.id());
                    return Err(EnqueueError {
                        job: Box::new(job),
                        capacity,
                    });
                }
                self.shared
                    .space_ready
                    .wait_for(&mut pending, self.config.poll_interval());
            }
        }
        pending.push_back(job);
        drop(pending);
        self.shared.job_ready.notify_one();
        Ok(())
    }

    /// Next finished job, if any; never blocks on the executor thread
    pub fn poll_finished(&self) -> Option<QueryJob> {
        self.shared.finished.lock().pop_front()
    }

    /// Start the executor thread; no-op while one is already running
    pub fn start(&self) -> std::io::Result<()> {
        {
            let mut running = self.shared.running.lock();
            if *running {
                log::debug!("Executor already running");
                return Ok(());
            }
            *running = true;
        }
        self.shared.shutdown.store(false, Ordering::Release);
        self.shared.set_state(ExecutorState::Connecting);

        let worker = Worker::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            Arc::clone(&self.config),
        );
        let spawned = std::thread::Builder::new()
            .name("querylite-executor".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.mark_stopped();
                Err(e)
            }
        }
    }

    /// Ask the executor thread to drain its queue and close the connection
    pub fn request_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // Taking the lock orders the flag before any waiter re-checks it
        let _pending = self.shared.pending.lock();
        self.shared.job_ready.notify_all();
        self.shared.space_ready.notify_all();
    }

    /// Wait for the executor thread to exit
    ///
    /// Returns false if it was still running after `timeout`; the thread is
    /// then left detached.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let stopped = {
            let mut running = self.shared.running.lock();
            while *running {
                if self.shared.stopped.wait_until(&mut running, deadline).timed_out() {
                    break;
                }
            }
            !*running
        };

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if stopped {
                if handle.join().is_err() {
                    log::error!("Executor thread panicked");
                }
            } else {
                // Dropping the handle detaches the thread
                drop(handle);
            }
        }
        stopped
    }

    /// `request_shutdown` followed by `wait_stopped`
    pub fn stop(&self, timeout: Duration) -> bool {
        self.request_shutdown();
        self.wait_stopped(timeout)
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }

    pub fn state(&self) -> ExecutorState {
        self.shared.state.get()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.shared.counters.snapshot()
    }

    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn finished_len(&self) -> usize {
        self.shared.finished.lock().len()
    }

    pub fn connector_name(&self) -> &'static str {
        self.connector.name()
    }
}
