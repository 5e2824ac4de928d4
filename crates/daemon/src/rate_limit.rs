// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-window request limiter keyed by client address.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_core::Clock;
use tower_wire::{ClientWindow, RateLimitStatsResponse};
use tracing::debug;

/// How often expired windows are swept.
const COMPACTION_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub window_ms: u64,
    pub max_requests: u64,
    /// Request paths with these prefixes bypass counting
    pub skip_paths: Vec<String>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            skip_paths: vec!["/api/health".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_ms: u64,
    count: u64,
}

/// Outcome of one request check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted; headers carry the remaining budget
    Allowed { limit: u64, remaining: u64, reset_secs: u64 },
    /// Over budget for this window
    Limited { limit: u64, retry_after_secs: u64 },
    /// Path is on the skip list; not counted
    Skipped,
}

/// Sliding fixed-window counter per client key.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { config, windows: Mutex::new(HashMap::new()) }
    }

    /// Count one request from `client` against `path`.
    pub fn check(&self, client: &str, path: &str, now_ms: u64) -> RateDecision {
        if self.config.skip_paths.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return RateDecision::Skipped;
        }

        let mut windows = self.windows.lock();
        let window = windows
            .entry(client.to_string())
            .and_modify(|w| {
                if now_ms.saturating_sub(w.started_ms) >= self.config.window_ms {
                    // New window; the old count expires wholesale.
                    w.started_ms = now_ms;
                    w.count = 0;
                }
            })
            .or_insert(Window { started_ms: now_ms, count: 0 });

        let reset_secs = self
            .config
            .window_ms
            .saturating_sub(now_ms.saturating_sub(window.started_ms))
            .div_ceil(1_000);

        if window.count >= self.config.max_requests {
            return RateDecision::Limited {
                limit: self.config.max_requests,
                retry_after_secs: reset_secs,
            };
        }
        window.count += 1;
        RateDecision::Allowed {
            limit: self.config.max_requests,
            remaining: self.config.max_requests - window.count,
            reset_secs,
        }
    }

    /// Drop windows that ended before `now_ms`.
    pub fn compact(&self, now_ms: u64) {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now_ms.saturating_sub(w.started_ms) < self.config.window_ms);
        let swept = before - windows.len();
        if swept > 0 {
            debug!(swept, "rate limiter compaction");
        }
    }

    /// Observability snapshot for `GET /api/stats/rate-limit`.
    pub fn stats(&self, now_ms: u64) -> RateLimitStatsResponse {
        let windows = self.windows.lock();
        let mut clients: Vec<ClientWindow> = windows
            .iter()
            .filter(|(_, w)| now_ms.saturating_sub(w.started_ms) < self.config.window_ms)
            .map(|(client, w)| ClientWindow {
                client: client.clone(),
                requests: w.count,
                reset_in: self
                    .config
                    .window_ms
                    .saturating_sub(now_ms.saturating_sub(w.started_ms))
                    .div_ceil(1_000),
            })
            .collect();
        clients.sort_by(|a, b| a.client.cmp(&b.client));
        RateLimitStatsResponse {
            active_clients: clients.len(),
            total_requests: clients.iter().map(|c| c.requests).sum(),
            clients,
        }
    }

    /// Background sweep, stoppable through the cancellation token.
    pub fn spawn_compaction<C: Clock>(
        self: &Arc<Self>,
        clock: C,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(COMPACTION_INTERVAL);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => limiter.compact(clock.epoch_ms()),
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
