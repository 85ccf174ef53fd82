// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Single-settle deferred results
//!
//! A [`Deferred`] starts pending and is settled exactly once, either
//! fulfilled with a value or rejected with an error. Completion handlers
//! observe the outcome:
//! - handlers attached while pending run at settlement, in attachment order
//! - handlers attached after settlement run immediately on the attaching thread
//! - every handler runs exactly once
//!
//! Settling twice is a programming error and is reported through
//! [`SettleError`]; the stored outcome is never overwritten.
//!
//! The engine settles its deferreds only from [`crate::Engine::tick`], so
//! handler code always runs on the thread that drives the tick.

mod combinators;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error::SettleError;

/// Observable lifecycle of a deferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    Pending,
    Fulfilled,
    Rejected,
}

/// Receives the outcome of a [`Deferred`]
///
/// Exactly one of the two methods is called, exactly once.
pub trait CompletionHandler<T, E>: Send {
    fn on_fulfilled(self: Box<Self>, value: &T);
    fn on_rejected(self: Box<Self>, error: &E);
}

/// Adapter turning a pair of closures into a handler
struct FnHandler<F, R> {
    on_ok: F,
    on_err: R,
}

impl<T, E, F, R> CompletionHandler<T, E> for FnHandler<F, R>
where
    F: FnOnce(&T) + Send,
    R: FnOnce(&E) + Send,
{
    fn on_fulfilled(self: Box<Self>, value: &T) {
        (self.on_ok)(value)
    }

    fn on_rejected(self: Box<Self>, error: &E) {
        (self.on_err)(error)
    }
}

pub type BoxedHandler<T, E> = Box<dyn CompletionHandler<T, E>>;

/// Terminal outcome, shared between the deferred and late handlers
enum Outcome<T, E> {
    Fulfilled(Arc<T>),
    Rejected(Arc<E>),
}

impl<T, E> Clone for Outcome<T, E> {
    fn clone(&self) -> Self {
        match self {
            Outcome::Fulfilled(value) => Outcome::Fulfilled(Arc::clone(value)),
            Outcome::Rejected(error) => Outcome::Rejected(Arc::clone(error)),
        }
    }
}

impl<T, E> Outcome<T, E> {
    fn state(&self) -> DeferredState {
        match self {
            Outcome::Fulfilled(_) => DeferredState::Fulfilled,
            Outcome::Rejected(_) => DeferredState::Rejected,
        }
    }

    fn dispatch(&self, handler: BoxedHandler<T, E>) {
        match self {
            Outcome::Fulfilled(value) => handler.on_fulfilled(value),
            Outcome::Rejected(error) => handler.on_rejected(error),
        }
    }
}

enum Slot<T, E> {
    Pending(Vec<BoxedHandler<T, E>>),
    Settled {
        outcome: Outcome<T, E>,
        // Handlers waiting for the settling thread to reach them; non-empty
        // only while `dispatching` is set
        backlog: VecDeque<BoxedHandler<T, E>>,
        dispatching: bool,
    },
}

/// One-shot future settled by its producer and observed through handlers
///
/// Cloning yields another handle to the same result.
pub struct Deferred<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .finish()
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a pending deferred
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending(Vec::new()))),
        }
    }

    /// Create a deferred that is already fulfilled
    pub fn fulfilled(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Settled {
                outcome: Outcome::Fulfilled(Arc::new(value)),
                backlog: VecDeque::new(),
                dispatching: false,
            })),
        }
    }

    /// Create a deferred that is already rejected
    pub fn rejected(error: E) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Settled {
                outcome: Outcome::Rejected(Arc::new(error)),
                backlog: VecDeque::new(),
                dispatching: false,
            })),
        }
    }

    pub fn state(&self) -> DeferredState {
        match &*self.slot.lock() {
            Slot::Pending(_) => DeferredState::Pending,
            Slot::Settled { outcome, .. } => outcome.state(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == DeferredState::Pending
    }

    /// Settled outcome, if any
    pub fn outcome(&self) -> Option<Result<Arc<T>, Arc<E>>> {
        match &*self.slot.lock() {
            Slot::Pending(_) => None,
            Slot::Settled { outcome, .. } => Some(match outcome {
                Outcome::Fulfilled(value) => Ok(Arc::clone(value)),
                Outcome::Rejected(error) => Err(Arc::clone(error)),
            }),
        }
    }

    /// Attach a completion handler
    pub fn attach(&self, handler: BoxedHandler<T, E>) {
        let outcome = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(handlers) => {
                    handlers.push(handler);
                    return;
                }
                Slot::Settled {
                    outcome,
                    backlog,
                    dispatching,
                } => {
                    // Queued behind earlier handlers; a dispatching thread
                    // picks it up, otherwise this thread drains the backlog
                    backlog.push_back(handler);
                    if *dispatching {
                        return;
                    }
                    *dispatching = true;
                    outcome.clone()
                }
            }
        };
        self.drain(&outcome);
    }

    /// Attach a pair of closures, one per outcome
    pub fn then<F, R>(&self, on_ok: F, on_err: R)
    where
        F: FnOnce(&T) + Send + 'static,
        R: FnOnce(&E) + Send + 'static,
    {
        self.attach(Box::new(FnHandler { on_ok, on_err }));
    }

    pub fn on_fulfilled<F>(&self, on_ok: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.then(on_ok, |_: &E| {});
    }

    pub fn on_rejected<R>(&self, on_err: R)
    where
        R: FnOnce(&E) + Send + 'static,
    {
        self.then(|_: &T| {}, on_err);
    }

    /// Fulfill with `value` and run the attached handlers on this thread
    #[must_use = "a double settle is a bug and must be handled"]
    pub fn resolve(&self, value: T) -> Result<(), SettleError> {
        self.settle(Outcome::Fulfilled(Arc::new(value)))
    }

    /// Reject with `error` and run the attached handlers on this thread
    #[must_use = "a double settle is a bug and must be handled"]
    pub fn reject(&self, error: E) -> Result<(), SettleError> {
        self.settle(Outcome::Rejected(Arc::new(error)))
    }

    fn settle(&self, outcome: Outcome<T, E>) -> Result<(), SettleError> {
        {
            let mut slot = self.slot.lock();
            let handlers = match &mut *slot {
                Slot::Pending(handlers) => std::mem::take(handlers),
                Slot::Settled { outcome, .. } => {
                    return Err(SettleError::AlreadySettled {
                        state: outcome.state(),
                    });
                }
            };
            *slot = Slot::Settled {
                outcome: outcome.clone(),
                backlog: handlers.into(),
                dispatching: true,
            };
        }

        self.drain(&outcome);
        Ok(())
    }

    /// Run backlogged handlers until none are left
    ///
    /// Called with `dispatching` set. If a handler panics the flag is
    /// cleared on unwind and the remaining backlog runs on the next attach.
    fn drain(&self, outcome: &Outcome<T, E>) {
        let _guard = DispatchGuard { slot: &self.slot };
        loop {
            let next = {
                let mut slot = self.slot.lock();
                match &mut *slot {
                    Slot::Settled {
                        backlog,
                        dispatching,
                        ..
                    } => match backlog.pop_front() {
                        Some(handler) => handler,
                        None => {
                            *dispatching = false;
                            break;
                        }
                    },
                    Slot::Pending(_) => break,
                }
            };
            outcome.dispatch(next);
        }
    }
}

struct DispatchGuard<'a, T, E> {
    slot: &'a Mutex<Slot<T, E>>,
}

impl<T, E> Drop for DispatchGuard<'_, T, E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Slot::Settled { dispatching, .. } = &mut *self.slot.lock() {
                *dispatching = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(String) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |tag: &str| {
            let log = Arc::clone(&log_clone);
            let tag = tag.to_string();
            Box::new(move |entry: String| log.lock().push(format!("{}:{}", tag, entry)))
                as Box<dyn Fn(String) + Send>
        };
        (log, make)
    }

    #[test]
    fn test_handlers_run_in_attachment_order() {
        let deferred: Deferred<i32, String> = Deferred::new();
        let (log, make) = recorder();

        for tag in ["a", "b", "c"] {
            let sink = make(tag);
            deferred.then(move |v| sink(v.to_string()), |_| panic!("unexpected rejection"));
        }
        assert!(log.lock().is_empty());

        deferred.resolve(7).unwrap();
        assert_eq!(*log.lock(), vec!["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn test_late_handler_runs_immediately() {
        let deferred: Deferred<i32, String> = Deferred::new();
        deferred.reject("boom".to_string()).unwrap();

        let (log, make) = recorder();
        let sink = make("late");
        deferred.then(|_| panic!("unexpected fulfillment"), move |e| sink(e.clone()));
        assert_eq!(*log.lock(), vec!["late:boom"]);
    }

    #[test]
    fn test_double_settle_fails_and_keeps_outcome() {
        let deferred: Deferred<i32, String> = Deferred::new();
        deferred.resolve(1).unwrap();

        let err = deferred.resolve(2).unwrap_err();
        assert_eq!(
            err,
            SettleError::AlreadySettled {
                state: DeferredState::Fulfilled
            }
        );
        assert!(deferred.reject("late".to_string()).is_err());

        assert_eq!(deferred.state(), DeferredState::Fulfilled);
        assert_eq!(*deferred.outcome().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_handler_attached_during_dispatch_keeps_order() {
        let deferred: Deferred<i32, String> = Deferred::new();
        let (log, make) = recorder();

        let inner = deferred.clone();
        let first = make("first");
        let nested = make("nested");
        deferred.on_fulfilled(move |v| {
            first(v.to_string());
            inner.on_fulfilled(move |v| nested(v.to_string()));
        });
        let second = make("second");
        deferred.on_fulfilled(move |v| second(v.to_string()));

        deferred.resolve(3).unwrap();
        assert_eq!(*log.lock(), vec!["first:3", "second:3", "nested:3"]);
    }

    #[test]
    fn test_handlers_still_run_after_a_handler_panics() {
        let deferred: Deferred<i32, String> = Deferred::new();
        let (log, make) = recorder();

        deferred.on_fulfilled(|_| panic!("handler failure"));
        let queued = make("queued");
        deferred.on_fulfilled(move |v| queued(v.to_string()));

        let settling = deferred.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| settling.resolve(9)));
        assert!(result.is_err());
        assert_eq!(deferred.state(), DeferredState::Fulfilled);
        assert!(log.lock().is_empty());

        // The next attach resumes the interrupted dispatch, then runs itself
        let late = make("late");
        deferred.on_fulfilled(move |v| late(v.to_string()));
        assert_eq!(*log.lock(), vec!["queued:9", "late:9"]);

        let later = make("later");
        deferred.on_fulfilled(move |v| later(v.to_string()));
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_each_handler_fires_once() {
        let deferred: Deferred<(), String> = Deferred::new();
        let count = Arc::new(Mutex::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            deferred.on_fulfilled(move |_| *count.lock() += 1);
        }
        deferred.resolve(()).unwrap();
        let _ = deferred.resolve(());
        let count_late = Arc::clone(&count);
        deferred.on_fulfilled(move |_| *count_late.lock() += 1);
        assert_eq!(*count.lock(), 4);
    }

    #[test]
    fn test_prebuilt_constructors() {
        let ok: Deferred<i32, String> = Deferred::fulfilled(5);
        assert_eq!(ok.state(), DeferredState::Fulfilled);
        let err: Deferred<i32, String> = Deferred::rejected("no".into());
        assert_eq!(err.state(), DeferredState::Rejected);
        assert_eq!(*err.outcome().unwrap().unwrap_err(), "no");
        assert!(Deferred::<i32, String>::new().is_pending());
    }
}
