// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tower_core::test_support::runtime_in;

#[test]
fn server_entry_from_runtime_carries_everything() {
    let mut runtime = runtime_in("alpha", ServerState::Running);
    runtime.restart_count = 2;
    runtime.dropped_log_count = 5;
    let entry = ServerEntry::from_runtime(runtime.clone(), 1, true, 30_000);

    assert_eq!(entry.name.as_str(), "alpha");
    assert_eq!(entry.pid, runtime.pid);
    assert_eq!(entry.restart_count, 2);
    assert_eq!(entry.dropped_log_count, 5);
    assert_eq!(entry.layer, 1);
    assert!(entry.critical);
    assert_eq!(entry.health_check_interval_ms, 30_000);
}

#[test]
fn server_entry_serializes_camel_case() {
    let entry =
        ServerEntry::from_runtime(runtime_in("alpha", ServerState::Stopped), 0, false, 30_000);
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["restartCount"], 0);
    assert_eq!(json["healthCheckIntervalMs"], 30_000);
    assert!(json.get("pid").is_none());
}

#[test]
fn api_error_variants() {
    let json = serde_json::to_value(ApiError::bad_request("missing field")).unwrap();
    assert_eq!(json["error"], "bad_request");
    assert_eq!(json["details"], "missing field");
    assert!(json.get("retryAfter").is_none());

    let json = serde_json::to_value(ApiError::rate_limited(42)).unwrap();
    assert_eq!(json["error"], "rate_limited");
    assert_eq!(json["retryAfter"], 42);

    let json = serde_json::to_value(ApiError::new("not_found")).unwrap();
    assert_eq!(json, serde_json::json!({"error": "not_found"}));
}

#[test]
fn health_and_accepted_shapes() {
    let json = serde_json::to_value(HealthResponse::ok(7)).unwrap();
    assert_eq!(json, serde_json::json!({"status": "ok", "at": 7}));

    let json = serde_json::to_value(AcceptedResponse::yes()).unwrap();
    assert_eq!(json, serde_json::json!({"accepted": true}));
}

#[test]
fn rate_limit_stats_round_trip() {
    let stats = RateLimitStatsResponse {
        active_clients: 1,
        total_requests: 12,
        clients: vec![ClientWindow { client: "10.0.0.1".to_string(), requests: 12, reset_in: 30 }],
    };
    let json = serde_json::to_string(&stats).unwrap();
    let back: RateLimitStatsResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back, stats);
}
