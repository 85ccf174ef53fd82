// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Executor lifecycle state and counters

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Connection lifecycle as seen by the executor thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutorState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

impl ExecutorState {
    fn as_u8(self) -> u8 {
        match self {
            ExecutorState::Disconnected => 0,
            ExecutorState::Connecting => 1,
            ExecutorState::Connected => 2,
            ExecutorState::ShuttingDown => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExecutorState::Connecting,
            2 => ExecutorState::Connected,
            3 => ExecutorState::ShuttingDown,
            _ => ExecutorState::Disconnected,
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Disconnected => "disconnected",
            ExecutorState::Connecting => "connecting",
            ExecutorState::Connected => "connected",
            ExecutorState::ShuttingDown => "shutting down",
        };
        write!(f, "{}", name)
    }
}

/// State cell written by the executor thread, readable from anywhere
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ExecutorState::Disconnected.as_u8()))
    }

    pub(crate) fn get(&self) -> ExecutorState {
        ExecutorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ExecutorState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Point-in-time copy of the executor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Jobs that produced a result set
    pub executed: u64,
    /// Jobs that finished with an error
    pub failed: u64,
    /// Jobs put back at the head of the queue after a connection loss
    pub requeued: u64,
    /// Successful connection attempts
    pub connects: u64,
    pub connect_failures: u64,
    pub connection_losses: u64,
    /// Read jobs dropped by the shutdown drain
    pub discarded: u64,
    /// Write jobs dropped because the connection was unusable during shutdown
    pub abandoned: u64,
    /// Exponent the next reconnect delay is computed from; 0 once connected
    pub backoff_exponent: u32,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) executed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) requeued: AtomicU64,
    pub(crate) connects: AtomicU64,
    pub(crate) connect_failures: AtomicU64,
    pub(crate) connection_losses: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) abandoned: AtomicU64,
    pub(crate) backoff_exponent: AtomicU32,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            backoff_exponent: self.backoff_exponent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_round_trip() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ExecutorState::Disconnected);
        for state in [
            ExecutorState::Connecting,
            ExecutorState::Connected,
            ExecutorState::ShuttingDown,
            ExecutorState::Disconnected,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        Counters::bump(&counters.executed);
        Counters::bump(&counters.executed);
        Counters::bump(&counters.requeued);
        let stats = counters.snapshot();
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.backoff_exponent, 0);
    }
}
