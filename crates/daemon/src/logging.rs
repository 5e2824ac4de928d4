// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `LOG_LEVEL` filter, stderr output, and an
/// optional file sink under the state directory.
///
/// Returns the appender guard; dropping it stops the background writer, so
/// the caller holds it for the life of the process.
pub fn init_logging(level: &str, to_file: bool, log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    if to_file && std::fs::create_dir_all(log_dir).is_ok() {
        let appender = tracing_appender::rolling::never(log_dir, "towerd.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .try_init();
        Some(guard)
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        None
    }
}
