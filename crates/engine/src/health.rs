// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probes and threshold tracking.

use std::time::Duration;
use tower_config::HealthCheck;
use tower_core::HealthState;

/// Per-probe connect timeout for TCP checks.
const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Run one probe. `child_alive` reflects whether the supervisor still owns a
/// live child; the `process` probe is exactly that check.
pub(crate) async fn probe(check: &HealthCheck, child_alive: bool) -> bool {
    match check {
        HealthCheck::None => true,
        HealthCheck::Process => child_alive,
        HealthCheck::Tcp { host, port } => {
            matches!(
                tokio::time::timeout(
                    TCP_PROBE_TIMEOUT,
                    tokio::net::TcpStream::connect((host.as_str(), *port)),
                )
                .await,
                Ok(Ok(_))
            )
        }
    }
}

/// Consecutive-failure tracker behind the probe schedule.
#[derive(Debug, Default)]
pub(crate) struct HealthTracker {
    consecutive_failures: u32,
    state: HealthState,
}

/// What the supervisor should do after a probe result.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HealthVerdict {
    /// No state change
    Unchanged,
    /// `health_state` changed; emit `health.updated`
    Changed(HealthState),
    /// Threshold reached; emit `health.updated` and restart the server
    RestartNeeded,
}

impl HealthTracker {
    pub(crate) fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.state = HealthState::Unknown;
    }

    pub(crate) fn state(&self) -> HealthState {
        self.state
    }

    pub(crate) fn record(&mut self, healthy: bool, threshold: u32) -> HealthVerdict {
        if healthy {
            self.consecutive_failures = 0;
            if self.state != HealthState::Healthy {
                self.state = HealthState::Healthy;
                return HealthVerdict::Changed(self.state);
            }
            return HealthVerdict::Unchanged;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            self.state = HealthState::Unhealthy;
            return HealthVerdict::RestartNeeded;
        }
        if self.state != HealthState::Unhealthy {
            self.state = HealthState::Unhealthy;
            return HealthVerdict::Changed(self.state);
        }
        HealthVerdict::Unchanged
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
