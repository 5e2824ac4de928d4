// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-subscriber queue with drop-oldest overflow.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_core::{Envelope, Event};

/// One coalesced overflow notice, pending until the subscriber catches up.
///
/// `seq` is reserved from the dispatcher's counter at the latest drop, so it
/// sorts after everything queued at that moment and before anything
/// published later. Delivery merges it back in `seq` order.
#[derive(Debug, Clone, Copy)]
struct PendingOverflow {
    seq: u64,
    count: u64,
    at: u64,
}

#[derive(Debug, Default)]
struct Inner {
    deque: VecDeque<Envelope>,
    overflow: Option<PendingOverflow>,
    dropped_total: u64,
    closed: bool,
}

/// Bounded FIFO between the dispatcher and one subscriber.
///
/// The dispatcher never blocks on a slow subscriber: a full queue drops its
/// oldest entry and the loss is reported through a synthetic
/// `hub.overflow` event.
#[derive(Debug)]
pub(crate) struct SubscriberQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl SubscriberQueue {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { capacity: capacity.max(1), inner: Mutex::new(Inner::default()), notify: Notify::new() })
    }

    /// Push an envelope, dropping the oldest entry when full.
    ///
    /// `reserve_seq` mints a sequence number from the dispatcher's counter
    /// for the coalesced overflow notice; it is only called on a drop.
    pub(crate) fn push(&self, envelope: Envelope, reserve_seq: &mut dyn FnMut() -> u64) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            if inner.deque.len() >= self.capacity {
                inner.deque.pop_front();
                inner.dropped_total += 1;
                let seq = reserve_seq();
                let at = envelope_at(&envelope);
                match &mut inner.overflow {
                    Some(pending) => {
                        pending.count += 1;
                        pending.seq = seq;
                        pending.at = at;
                    }
                    None => inner.overflow = Some(PendingOverflow { seq, count: 1, at }),
                }
            }
            inner.deque.push_back(envelope);
        }
        self.notify.notify_one();
    }

    /// Next envelope in `seq` order, merging in any pending overflow.
    /// Returns `None` once the queue is closed and drained.
    pub(crate) async fn recv(&self) -> Option<Envelope> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                let overflow_first = match (&inner.overflow, inner.deque.front()) {
                    (Some(pending), Some(front)) => pending.seq < front.seq,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if overflow_first {
                    if let Some(pending) = inner.overflow.take() {
                        return Some(Envelope {
                            seq: pending.seq,
                            event: Event::Overflow { dropped_count: pending.count, at: pending.at },
                        });
                    }
                }
                if let Some(envelope) = inner.deque.pop_front() {
                    return Some(envelope);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking variant for tests and draining.
    pub(crate) fn try_recv(&self) -> Option<Envelope> {
        let mut inner = self.inner.lock();
        let overflow_first = match (&inner.overflow, inner.deque.front()) {
            (Some(pending), Some(front)) => pending.seq < front.seq,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if overflow_first {
            if let Some(pending) = inner.overflow.take() {
                return Some(Envelope {
                    seq: pending.seq,
                    event: Event::Overflow { dropped_count: pending.count, at: pending.at },
                });
            }
        }
        inner.deque.pop_front()
    }

    pub(crate) fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub(crate) fn dropped_total(&self) -> u64 {
        self.inner.lock().dropped_total
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().deque.len()
    }
}

fn envelope_at(envelope: &Envelope) -> u64 {
    match &envelope.event {
        Event::StateChanged { at, .. }
        | Event::Started { at, .. }
        | Event::Stopped { at, .. }
        | Event::ServerError { at, .. }
        | Event::Log { at, .. }
        | Event::HealthUpdated { at, .. }
        | Event::Heartbeat { at }
        | Event::Overflow { at, .. } => *at,
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
