// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate limiting through the full HTTP stack.

use super::prelude::*;

fn solo_catalog() -> Catalog {
    Catalog::from_descriptors([(server_name("solo"), {
        let mut d = descriptor("sleep", &["3600"], 0);
        d.metadata.auto_start = false;
        d
    })])
    .expect("catalog")
}

#[tokio::test]
async fn fourth_rapid_request_is_limited() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let app = fleet.app(3, 1_000);

    for i in 0..3 {
        let (status, _) = request(&app, "GET", "/api/servers", Some("192.0.2.7")).await;
        assert_eq!(status, axum::http::StatusCode::OK, "request {i} should pass");
    }

    let (status, body) = request(&app, "GET", "/api/servers", Some("192.0.2.7")).await;
    assert_eq!(status, axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");
    assert!(body["retryAfter"].as_u64().expect("retryAfter") <= 1);

    // A different client is unaffected.
    let (status, _) = request(&app, "GET", "/api/servers", Some("192.0.2.8")).await;
    assert_eq!(status, axum::http::StatusCode::OK);

    // Health stays reachable regardless.
    let (status, _) = request(&app, "GET", "/api/health", Some("192.0.2.7")).await;
    assert_eq!(status, axum::http::StatusCode::OK);

    fleet.cancel.cancel();
}

#[tokio::test]
async fn stats_endpoint_reports_the_counted_clients() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let app = fleet.app(10, 60_000);

    request(&app, "GET", "/api/servers", Some("192.0.2.20")).await;
    request(&app, "GET", "/api/servers", Some("192.0.2.20")).await;
    let (status, body) = request(&app, "GET", "/api/stats/rate-limit", Some("192.0.2.21")).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert!(body["totalRequests"].as_u64().expect("total") >= 2);
    assert!(body["clients"]
        .as_array()
        .expect("clients")
        .iter()
        .any(|c| c["client"] == "192.0.2.20" && c["requests"] == 2));

    fleet.cancel.cancel();
}
