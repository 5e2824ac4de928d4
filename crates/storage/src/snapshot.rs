// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot schema and migration policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_core::{ServerName, ServerRuntime, ServerState};

/// Current snapshot schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Per-server state carried across tower restarts.
///
/// `pid` is advisory only: reconciliation never probes it, and health is
/// always recomputed, so neither is authoritative after a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedServer {
    pub state: ServerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PersistedServer {
    pub fn from_runtime(runtime: &ServerRuntime) -> Self {
        Self {
            state: runtime.state,
            pid: runtime.pid,
            started_at: runtime.started_at,
            restart_count: runtime.restart_count,
            last_error: runtime.last_error.clone(),
        }
    }
}

/// The full persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub servers: BTreeMap<ServerName, PersistedServer>,
}

impl StateSnapshot {
    pub fn new(servers: BTreeMap<ServerName, PersistedServer>) -> Self {
        Self { schema_version: CURRENT_SCHEMA_VERSION, saved_at: Utc::now(), servers }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    /// Best-effort migration from an older schema.
    ///
    /// Version 1 is the first schema; anything older than current but
    /// recognized is upgraded in place, anything newer is unknowable and
    /// handled by the store's corrupt-state policy.
    pub(crate) fn migrate(mut self) -> Option<Self> {
        if self.schema_version > CURRENT_SCHEMA_VERSION {
            return None;
        }
        self.schema_version = CURRENT_SCHEMA_VERSION;
        Some(self)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
