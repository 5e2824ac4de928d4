// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-blocking event emission from supervisors.
//!
//! The supervisor must never block on the hub ingress while it owns a live
//! child. Emissions go through a local pending buffer: log events beyond the
//! buffer bound are dropped oldest-first (counted per server); state events
//! are always kept.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use tower_core::Event;

/// Pending-buffer bound before old log events are shed.
const MAX_PENDING: usize = 256;

pub(crate) struct EventEmitter {
    tx: mpsc::Sender<Event>,
    pending: VecDeque<Event>,
}

impl EventEmitter {
    pub(crate) fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx, pending: VecDeque::new() }
    }

    /// Queue an event and flush what fits. Returns how many log events were
    /// dropped to keep the buffer bounded.
    pub(crate) fn emit(&mut self, event: Event) -> u64 {
        self.pending.push_back(event);
        self.flush()
    }

    /// Push pending events into the channel without waiting.
    pub(crate) fn flush(&mut self) -> u64 {
        while let Some(event) = self.pending.front() {
            match self.tx.try_send(event.clone()) {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(mpsc::error::TrySendError::Full(_)) => break,
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.pending.clear();
                    return 0;
                }
            }
        }

        let mut dropped = 0;
        while self.pending.len() > MAX_PENDING {
            match self.pending.iter().position(|e| matches!(e, Event::Log { .. })) {
                Some(idx) => {
                    self.pending.remove(idx);
                    dropped += 1;
                }
                // Nothing sheddable; state events stay queued.
                None => break,
            }
        }
        dropped
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
