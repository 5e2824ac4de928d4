// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Jitter factor bounds applied to every delay.
const JITTER: f64 = 0.2;

/// Delay before restart `attempt` (0-based):
/// `min(cap, base · 2^attempt) · (1 + rand[-0.2, 0.2])`.
pub fn restart_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    with_jitter(base, cap, attempt, rand::thread_rng().gen_range(-JITTER..=JITTER))
}

fn with_jitter(base: Duration, cap: Duration, attempt: u32, jitter: f64) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt)).min(cap);
    exp.mul_f64(1.0 + jitter)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
