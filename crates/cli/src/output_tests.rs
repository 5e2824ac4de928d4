// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tower_wire::StatsSummary;

fn entry(json: serde_json::Value) -> ServerEntry {
    serde_json::from_value(json).unwrap()
}

fn sample() -> ServersResponse {
    ServersResponse {
        servers: vec![
            entry(serde_json::json!({
                "name": "postgres",
                "state": "running",
                "pid": 4321,
                "restartCount": 1,
                "healthState": "healthy",
                "droppedLogCount": 0,
                "layer": 0,
                "critical": true,
                "healthCheckIntervalMs": 30000,
            })),
            entry(serde_json::json!({
                "name": "browser",
                "state": "stopped",
                "restartCount": 0,
                "healthState": "unknown",
                "droppedLogCount": 0,
                "layer": 1,
                "critical": false,
                "healthCheckIntervalMs": 30000,
            })),
        ],
        stats: StatsSummary { running: 1, stopped: 1, error: 0, total: 2 },
    }
}

#[test]
fn renders_aligned_columns() {
    let text = render_status(&sample());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "NAME      STATE    PID   RESTARTS  HEALTH");
    assert_eq!(lines[1], "postgres  running  4321  1         healthy");
    assert_eq!(lines[2], "browser   stopped  -     0         unknown");
}

#[test]
fn renders_the_aggregate_line() {
    let text = render_status(&sample());
    assert!(text.ends_with("1 running, 1 stopped, 0 error (2 total)\n"));
}

#[test]
fn empty_fleet_still_renders_header() {
    let response = ServersResponse {
        servers: vec![],
        stats: StatsSummary { running: 0, stopped: 0, error: 0, total: 0 },
    };
    let text = render_status(&response);
    assert!(text.starts_with("NAME  STATE  PID  RESTARTS  HEALTH\n"));
}
