// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events broadcast by the hub.
//!
//! Serializes with `{"type": "server.state_changed", ...fields}` format, the
//! same shape clients see on the WebSocket (with `seq` added by the
//! envelope). One variant per fact; payloads are fixed at compile time.

use crate::log_line::LogStream;
use crate::server::{HealthState, ServerName, ServerState};
use serde::{Deserialize, Serialize};

/// Broadcast channels a subscriber can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Servers,
    Health,
    Logs,
}

/// Events emitted by supervisors and the hub itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "server.state_changed")]
    #[serde(rename_all = "camelCase")]
    StateChanged { name: ServerName, from: ServerState, to: ServerState, at: u64 },

    #[serde(rename = "server.started")]
    #[serde(rename_all = "camelCase")]
    Started { name: ServerName, pid: u32, at: u64 },

    #[serde(rename = "server.stopped")]
    #[serde(rename_all = "camelCase")]
    Stopped {
        name: ServerName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
        at: u64,
    },

    #[serde(rename = "server.error")]
    #[serde(rename_all = "camelCase")]
    ServerError { name: ServerName, error: String, at: u64 },

    #[serde(rename = "server.log")]
    #[serde(rename_all = "camelCase")]
    Log { name: ServerName, stream: LogStream, message: String, at: u64 },

    #[serde(rename = "health.updated")]
    #[serde(rename_all = "camelCase")]
    HealthUpdated { name: ServerName, health_state: HealthState, at: u64 },

    #[serde(rename = "hub.heartbeat")]
    #[serde(rename_all = "camelCase")]
    Heartbeat { at: u64 },

    /// Synthetic, per-subscriber: queued events were dropped since the
    /// subscriber last drained. Coalesced; `dropped_count` is the burst total.
    #[serde(rename = "hub.overflow")]
    #[serde(rename_all = "camelCase")]
    Overflow { dropped_count: u64, at: u64 },
}

impl Event {
    /// Channel the event belongs to. `None` means a control event
    /// (heartbeat, overflow) delivered regardless of subscription channels.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Event::StateChanged { .. }
            | Event::Started { .. }
            | Event::Stopped { .. }
            | Event::ServerError { .. } => Some(Channel::Servers),
            Event::HealthUpdated { .. } => Some(Channel::Health),
            Event::Log { .. } => Some(Channel::Logs),
            Event::Heartbeat { .. } | Event::Overflow { .. } => None,
        }
    }

    /// Server the event is about, for name filtering.
    pub fn server_name(&self) -> Option<&ServerName> {
        match self {
            Event::StateChanged { name, .. }
            | Event::Started { name, .. }
            | Event::Stopped { name, .. }
            | Event::ServerError { name, .. }
            | Event::Log { name, .. }
            | Event::HealthUpdated { name, .. } => Some(name),
            Event::Heartbeat { .. } | Event::Overflow { .. } => None,
        }
    }

    /// True for state-machine transitions the orchestrator persists on.
    pub fn is_state_changed(&self) -> bool {
        matches!(self, Event::StateChanged { .. })
    }
}

/// A published event with its hub-assigned sequence number.
///
/// For any single subscriber, delivered envelopes are strictly increasing
/// in `seq`; there is no cross-subscriber ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    #[serde(flatten)]
    pub event: Event,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
