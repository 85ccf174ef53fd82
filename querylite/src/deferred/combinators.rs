// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `race` and `all` over groups of deferred results

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::Deferred;

struct AllSlots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Settle with the first member to fulfill
    ///
    /// Rejections are ignored while another member may still fulfill. When
    /// every member has rejected, the race rejects with the last error seen.
    /// An empty race never settles.
    pub fn race(members: &[Deferred<T, E>]) -> Deferred<T, E> {
        let winner = Deferred::new();
        let remaining = Arc::new(AtomicUsize::new(members.len()));

        for member in members {
            let on_ok = winner.clone();
            let on_err = winner.clone();
            let remaining = Arc::clone(&remaining);
            member.then(
                move |value: &T| {
                    // Losers are expected to hit an already-settled winner
                    let _ = on_ok.resolve(value.clone());
                },
                move |error: &E| {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let _ = on_err.reject(error.clone());
                    }
                },
            );
        }
        winner
    }

    /// Fulfill once every member has fulfilled, reject on the first rejection
    ///
    /// Values are returned in member order, regardless of the order in
    /// which the members settled.
    pub fn all(members: &[Deferred<T, E>]) -> Deferred<Vec<T>, E> {
        let aggregate = Deferred::new();
        if members.is_empty() {
            let _ = aggregate.resolve(Vec::new());
            return aggregate;
        }

        let slots = Arc::new(Mutex::new(AllSlots {
            values: vec![None; members.len()],
            remaining: members.len(),
        }));

        for (index, member) in members.iter().enumerate() {
            let on_ok = aggregate.clone();
            let on_err = aggregate.clone();
            let slots = Arc::clone(&slots);
            member.then(
                move |value: &T| {
                    let complete = {
                        let mut slots = slots.lock();
                        slots.values[index] = Some(value.clone());
                        slots.remaining -= 1;
                        if slots.remaining == 0 {
                            Some(slots.values.drain(..).flatten().collect::<Vec<T>>())
                        } else {
                            None
                        }
                    };
                    if let Some(values) = complete {
                        // Fails only if a member already rejected the aggregate
                        let _ = on_ok.resolve(values);
                    }
                },
                move |error: &E| {
                    let _ = on_err.reject(error.clone());
                },
            );
        }
        aggregate
    }
}
