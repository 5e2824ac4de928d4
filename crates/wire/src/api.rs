// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API request/response bodies.

use serde::{Deserialize, Serialize};
use tower_core::{ExitInfo, HealthState, ServerName, ServerRuntime, ServerState};

/// One server in `GET /api/servers` and `GET /api/servers/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    pub name: ServerName,
    pub state: ServerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<ExitInfo>,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub health_state: HealthState,
    pub dropped_log_count: u64,
    pub layer: u32,
    pub critical: bool,
    /// Effective probe interval after tuning
    pub health_check_interval_ms: u64,
}

impl ServerEntry {
    pub fn from_runtime(
        runtime: ServerRuntime,
        layer: u32,
        critical: bool,
        health_check_interval_ms: u64,
    ) -> Self {
        Self {
            name: runtime.name,
            state: runtime.state,
            pid: runtime.pid,
            started_at: runtime.started_at,
            last_exit: runtime.last_exit,
            restart_count: runtime.restart_count,
            last_error: runtime.last_error,
            health_state: runtime.health_state,
            dropped_log_count: runtime.dropped_log_count,
            layer,
            critical,
            health_check_interval_ms,
        }
    }
}

/// Aggregate counts alongside the server list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub running: usize,
    pub stopped: usize,
    pub error: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServersResponse {
    pub servers: Vec<ServerEntry>,
    pub stats: StatsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub at: u64,
}

impl HealthResponse {
    pub fn ok(at: u64) -> Self {
        Self { status: "ok".to_string(), at }
    }
}

/// Body for the 202 responses of the write endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

impl AcceptedResponse {
    pub fn yes() -> Self {
        Self { accepted: true }
    }
}

/// Uniform error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Seconds until the rate window resets (429 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None, retry_after: None }
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        Self { error: "bad_request".to_string(), details: Some(details.into()), retry_after: None }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self { error: "rate_limited".to_string(), details: None, retry_after: Some(retry_after) }
    }
}

/// One client in `GET /api/stats/rate-limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWindow {
    pub client: String,
    pub requests: u64,
    /// Seconds until this client's window resets
    pub reset_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatsResponse {
    pub active_clients: usize,
    pub total_requests: u64,
    pub clients: Vec<ClientWindow>,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
