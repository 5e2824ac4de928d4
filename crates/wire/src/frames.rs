// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket frames.
//!
//! Client→server frames use upper-case `type` tags (`SUBSCRIBE`, `PING`);
//! server→client frames are either control frames below or event envelopes
//! serialized as-is (`{"type": "server.state_changed", "seq": …, …}`).

use serde::{Deserialize, Serialize};
use tower_core::{Channel, SubscriptionId};

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Replace the subscription's channel set
    #[serde(rename = "SUBSCRIBE")]
    Subscribe { channels: Vec<Channel> },

    #[serde(rename = "PING")]
    Ping,
}

/// Control frames the gateway sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// First frame after upgrade
    #[serde(rename = "connected")]
    #[serde(rename_all = "camelCase")]
    Connected { subscription_id: SubscriptionId, server_time_ms: u64 },

    #[serde(rename = "PONG")]
    Pong { at: u64 },

    /// Protocol-level complaint; the connection stays open
    #[serde(rename = "ERROR")]
    Error { reason: String },
}

impl ServerFrame {
    pub fn unknown_type() -> Self {
        Self::Error { reason: "unknown_type".to_string() }
    }
}

#[cfg(test)]
#[path = "frames_tests.rs"]
mod tests;
