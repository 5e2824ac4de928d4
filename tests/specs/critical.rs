// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layer barrier with a critical failure: boot aborts, dependents never
//! start, and the tower itself keeps answering.

use super::prelude::*;
use tower_engine::BootError;

#[tokio::test]
async fn critical_layer_failure_aborts_boot_but_not_the_tower() {
    let catalog = Catalog::from_descriptors([
        (server_name("k0"), {
            let mut d = descriptor("false", &[], 0);
            d.metadata.critical = true;
            d
        }),
        (server_name("k1"), depends_on(descriptor("sleep", &["3600"], 1), &["k0"])),
    ])
    .expect("catalog");
    let fleet = fleet(catalog, fast_tuning());

    match fleet.orchestrator.start_all().await {
        Err(BootError::CriticalFailed { name, .. }) => assert_eq!(name.as_str(), "k0"),
        other => panic!("expected a critical abort, got {other:?}"),
    }

    // k1 never left stopped.
    assert_eq!(
        fleet.orchestrator.status_of("k1").map(|rt| rt.state),
        Some(ServerState::Stopped)
    );

    // The tower still answers: the fleet is down, the tower is not.
    let app = fleet.app(1_000, 60_000);
    let (status, body) = request(&app, "GET", "/api/health", None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = request(&app, "GET", "/api/servers", None).await;
    assert_eq!(body["stats"]["error"], 1);
    assert_eq!(body["stats"]["running"], 0);

    fleet.cancel.cancel();
}
