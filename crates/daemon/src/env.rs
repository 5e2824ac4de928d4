// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// HTTP+WS listen port (`API_PORT`, default 8080).
pub fn api_port() -> u16 {
    parsed("API_PORT").unwrap_or(8080)
}

/// HTTP+WS listen host (`API_HOST`, default 0.0.0.0).
pub fn api_host() -> String {
    std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

/// Dashboard asset port (`DASHBOARD_PORT`, default 3000). Recognized for
/// operator environments; the tower itself serves no static assets.
pub fn dashboard_port() -> u16 {
    parsed("DASHBOARD_PORT").unwrap_or(3000)
}

/// Log filter (`LOG_LEVEL`, default info).
pub fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// File sink toggle (`LOG_TO_FILE`; `"false"` disables it).
pub fn log_to_file() -> bool {
    std::env::var("LOG_TO_FILE").map(|v| v != "false").unwrap_or(true)
}

/// Rate window length (`RATE_LIMIT_WINDOW_MS`, default 60000).
pub fn rate_limit_window_ms() -> u64 {
    parsed("RATE_LIMIT_WINDOW_MS").unwrap_or(60_000)
}

/// Requests allowed per window (`RATE_LIMIT_MAX_REQUESTS`, default 100).
pub fn rate_limit_max_requests() -> u64 {
    parsed("RATE_LIMIT_MAX_REQUESTS").unwrap_or(100)
}

/// Allowed CORS origins (`CORS_ORIGINS`, comma-separated). Empty means
/// any origin.
pub fn cors_origins() -> Vec<String> {
    std::env::var("CORS_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve state directory:
/// `TOWER_STATE_DIR` > `XDG_STATE_HOME/tower` > `~/.local/state/tower`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TOWER_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("tower"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/state/tower"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
