// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server identity and runtime state.
//!
//! A `ServerName` comes from the catalog and is the only handle clients ever
//! hold on a managed process. `ServerRuntime` is the mutable per-server
//! record owned exclusively by that server's supervisor task.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validated server name: `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServerName(String);

/// Invalid server name
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("server name is empty")]
    Empty,
    #[error("server name {0:?} contains invalid character {1:?}")]
    InvalidChar(String, char),
}

impl ServerName {
    pub fn parse(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        match name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-') {
            Some(bad) => Err(NameError::InvalidChar(name.clone(), bad)),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for ServerName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ServerName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServerName::parse(s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a managed server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
    Restarting,
}

impl ServerState {
    /// States in which the runtime holds a live pid.
    pub fn has_pid(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Terminal states within one lifecycle (until an operator intervenes).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    /// States that settle a start attempt for the layer barrier.
    pub fn settles_start(self) -> bool {
        matches!(self, Self::Running | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
            Self::Restarting => "restarting",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health probe verdict for a running server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitInfo {
    /// Exit code, when the child exited normally
    pub code: Option<i32>,
    /// Terminating signal number, when killed
    pub signal: Option<i32>,
    /// Wall-clock time of the exit (epoch ms)
    pub at: u64,
}

/// Mutable per-server record, owned by the server's supervisor task.
///
/// Invariant: `pid.is_some()` iff `state.has_pid()`. The transition helpers
/// below maintain it; direct field writes outside the supervisor are a bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRuntime {
    pub name: ServerName,
    pub state: ServerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Epoch ms of the most recent transition into `running`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<ExitInfo>,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub health_state: HealthState,
    /// Log events dropped because the hub ingress was saturated
    pub dropped_log_count: u64,
}

impl ServerRuntime {
    pub fn new(name: ServerName) -> Self {
        Self {
            name,
            state: ServerState::Stopped,
            pid: None,
            started_at: None,
            last_exit: None,
            restart_count: 0,
            last_error: None,
            health_state: HealthState::Unknown,
            dropped_log_count: 0,
        }
    }

    /// Move to a pid-carrying state.
    pub fn set_active(&mut self, state: ServerState, pid: u32) {
        debug_assert!(state.has_pid());
        self.state = state;
        self.pid = Some(pid);
    }

    /// Move to a pid-free state, clearing the pid. Health is recomputed
    /// once the server runs again.
    pub fn set_idle(&mut self, state: ServerState) {
        debug_assert!(!state.has_pid());
        self.state = state;
        self.pid = None;
        self.health_state = HealthState::Unknown;
    }

    /// The pid/state invariant, checked by tests and debug assertions.
    /// `starting` is exempt for the window before the runner yields a pid.
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            ServerState::Starting => true,
            state => self.pid.is_some() == state.has_pid(),
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
