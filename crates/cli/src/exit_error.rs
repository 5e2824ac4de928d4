// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit code mapping: 0 normal, 1 fatal config error, 2 unexpected crash,
//! 130 interrupted.

use std::process::ExitCode;
use tower_daemon::{DaemonError, ShutdownKind};

/// What a command run produced.
pub enum Outcome {
    Done,
    Interrupted,
    ConfigError(String),
    Crash(String),
}

impl Outcome {
    pub fn from_daemon(result: Result<ShutdownKind, DaemonError>) -> Self {
        match result {
            Ok(ShutdownKind::Terminated) => Self::Done,
            Ok(ShutdownKind::Interrupted) => Self::Interrupted,
            Err(DaemonError::Config(e)) => Self::ConfigError(e.to_string()),
            Err(e) => Self::Crash(e.to_string()),
        }
    }

    pub fn from_result(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => Self::Crash(format!("{e:#}")),
        }
    }
}

pub fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Done => ExitCode::SUCCESS,
        Outcome::Interrupted => ExitCode::from(130),
        Outcome::ConfigError(message) => {
            eprintln!("tower: configuration error: {message}");
            ExitCode::from(1)
        }
        Outcome::Crash(message) => {
            eprintln!("tower: {message}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
