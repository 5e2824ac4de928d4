// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process output lines.

use crate::server::ServerName;
use serde::{Deserialize, Serialize};

/// Maximum bytes per emitted line. Longer child output is split on a byte
/// boundary and the tail pieces carry the continuation flag.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Severity attached to a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Default level for a raw child line: stdout is informational,
    /// stderr is treated as an error report.
    pub fn for_stream(stream: LogStream) -> Self {
        match stream {
            LogStream::Stdout => Self::Info,
            LogStream::Stderr => Self::Error,
        }
    }
}

/// One line of child output, as captured by the process runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub server: ServerName,
    pub stream: LogStream,
    pub level: LogLevel,
    /// Epoch ms at capture time
    pub timestamp: u64,
    pub message: String,
    /// True for the tail pieces of a line split at [`MAX_LINE_BYTES`]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continuation: bool,
}

#[cfg(test)]
#[path = "log_line_tests.rs"]
mod tests;
