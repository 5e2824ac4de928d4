// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator tuning from `mcp.orchestrator`.

use serde::Deserialize;
use std::time::Duration;

/// Fleet-wide knobs, all optional in the document.
///
/// Millisecond-valued fields mirror the config surface; code reads the
/// `Duration` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Tuning {
    #[serde(default = "defaults::max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "defaults::backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "defaults::backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "defaults::restart_count_reset_after_ms")]
    pub restart_count_reset_after_ms: u64,
    #[serde(default = "defaults::health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    #[serde(default = "defaults::unhealthy_threshold")]
    pub unhealthy_threshold: u32,
    #[serde(default = "defaults::boot_timeout_ms")]
    pub boot_timeout_ms: u64,
    #[serde(default = "defaults::shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Per-server grace between TERM and KILL during stop
    #[serde(default = "defaults::stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default = "defaults::persist_interval_ms")]
    pub persist_interval_ms: u64,
    #[serde(default = "defaults::heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

mod defaults {
    pub fn max_restarts() -> u32 {
        3
    }
    pub fn backoff_initial_ms() -> u64 {
        500
    }
    pub fn backoff_max_ms() -> u64 {
        30_000
    }
    pub fn restart_count_reset_after_ms() -> u64 {
        60_000
    }
    pub fn health_check_interval_ms() -> u64 {
        30_000
    }
    pub fn unhealthy_threshold() -> u32 {
        3
    }
    pub fn boot_timeout_ms() -> u64 {
        60_000
    }
    pub fn shutdown_timeout_ms() -> u64 {
        30_000
    }
    pub fn stop_grace_ms() -> u64 {
        10_000
    }
    pub fn persist_interval_ms() -> u64 {
        500
    }
    pub fn heartbeat_interval_ms() -> u64 {
        30_000
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_restarts: defaults::max_restarts(),
            backoff_initial_ms: defaults::backoff_initial_ms(),
            backoff_max_ms: defaults::backoff_max_ms(),
            restart_count_reset_after_ms: defaults::restart_count_reset_after_ms(),
            health_check_interval_ms: defaults::health_check_interval_ms(),
            unhealthy_threshold: defaults::unhealthy_threshold(),
            boot_timeout_ms: defaults::boot_timeout_ms(),
            shutdown_timeout_ms: defaults::shutdown_timeout_ms(),
            stop_grace_ms: defaults::stop_grace_ms(),
            persist_interval_ms: defaults::persist_interval_ms(),
            heartbeat_interval_ms: defaults::heartbeat_interval_ms(),
        }
    }
}

impl Tuning {
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn restart_count_reset_after(&self) -> Duration {
        Duration::from_millis(self.restart_count_reset_after_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_millis(self.boot_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[cfg(test)]
#[path = "tuning_tests.rs"]
mod tests;
