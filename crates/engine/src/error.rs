// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;
use tower_core::ServerName;

/// A single start attempt failed before the child was usable.
///
/// Never retried by the runner itself; the supervisor's restart policy
/// decides what happens next.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("executable not found: {command}")]
    NotFound { command: String },

    #[error("permission denied: {command}")]
    PermissionDenied { command: String },

    #[error("failed to spawn {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    pub(crate) fn from_io(command: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { command: command.to_string() },
            std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied { command: command.to_string() }
            }
            _ => Self::Io { command: command.to_string(), source },
        }
    }
}

/// Operator command rejections, surfaced as HTTP 404/409.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown server {0}")]
    UnknownServer(String),

    #[error("server {0} is already running")]
    AlreadyRunning(ServerName),

    #[error("server {0} is already stopped")]
    AlreadyStopped(ServerName),

    #[error("server {0} is shutting down")]
    ShuttingDown(ServerName),
}

/// Boot-time failures of `start_all`.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("critical server {name} failed to start: {error}")]
    CriticalFailed { name: ServerName, error: String },

    #[error("boot timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Orchestrator construction/persistence failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] tower_storage::StoreError),
}
