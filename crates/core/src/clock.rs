// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides monotonic and wall-clock time.
///
/// All timestamps that cross a process or wire boundary use `epoch_ms`;
/// `now` is only ever compared against other `now` readings.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock for tests.
///
/// Both readings move together under `advance`, so durations measured
/// against `now` agree with wall-clock deltas derived from `epoch_ms`.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualInner>>,
}

struct ManualInner {
    now: Instant,
    epoch_ms: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(1_700_000_000_000)
    }

    /// Create a clock whose `epoch_ms` starts at the given value.
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self { inner: Arc::new(Mutex::new(ManualInner { now: Instant::now(), epoch_ms })) }
    }

    /// Advance both readings by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.now += duration;
        inner.epoch_ms += duration.as_millis() as u64;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner.lock().now
    }

    fn epoch_ms(&self) -> u64 {
        self.inner.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
