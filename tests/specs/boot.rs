// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path boot and stop: two layers come up in dependency order and go
//! down in reverse.

use super::prelude::*;

fn catalog() -> Catalog {
    Catalog::from_descriptors([
        (server_name("alpha"), descriptor("sleep", &["3600"], 0)),
        (server_name("beta"), depends_on(descriptor("sleep", &["3600"], 1), &["alpha"])),
    ])
    .expect("catalog")
}

#[tokio::test]
async fn start_all_then_stop_all_in_layer_order() {
    let fleet = fleet(catalog(), fast_tuning());
    let subscriber = fleet.hub.subscribe(SubscribeOptions::default());

    fleet.orchestrator.start_all().await.expect("boot");

    // The API agrees with the fleet.
    let app = fleet.app(1_000, 60_000);
    let (status, body) = request(&app, "GET", "/api/servers", None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["stats"]["running"], 2);

    fleet.orchestrator.stop_all().await;
    assert_eq!(wait_state(&fleet, "alpha", ServerState::Stopped).await.state, ServerState::Stopped);
    assert_eq!(wait_state(&fleet, "beta", ServerState::Stopped).await.state, ServerState::Stopped);

    // Startup respects layers (alpha running before beta starting), and
    // shutdown is the reverse (beta stopping before alpha stopping).
    let mut alpha_running = None;
    let mut beta_starting = None;
    let mut beta_stopping = None;
    let mut alpha_stopping = None;
    while let Some(envelope) = subscriber.try_recv() {
        if let Event::StateChanged { name, to, .. } = &envelope.event {
            let slot = match (name.as_str(), *to) {
                ("alpha", ServerState::Running) => &mut alpha_running,
                ("beta", ServerState::Starting) => &mut beta_starting,
                ("beta", ServerState::Stopping) => &mut beta_stopping,
                ("alpha", ServerState::Stopping) => &mut alpha_stopping,
                _ => continue,
            };
            slot.get_or_insert(envelope.seq);
        }
    }
    assert!(alpha_running.expect("alpha ran") < beta_starting.expect("beta started"));
    assert!(beta_stopping.expect("beta stopped") < alpha_stopping.expect("alpha stopped"));

    fleet.cancel.cancel();
}

#[tokio::test]
async fn concurrent_restarts_collapse_on_the_inbox() {
    let catalog = Catalog::from_descriptors([(
        server_name("solo"),
        descriptor("sleep", &["3600"], 0),
    )])
    .expect("catalog");
    let fleet = fleet(catalog, fast_tuning());
    let subscriber = fleet.hub.subscribe(SubscribeOptions::default());

    fleet.orchestrator.start("solo").await.expect("start");
    wait_state(&fleet, "solo", ServerState::Running).await;

    // Duplicate restarts land FIFO on the same inbox.
    let (a, b) = tokio::join!(
        fleet.orchestrator.restart("solo"),
        fleet.orchestrator.restart("solo"),
    );
    a.expect("restart");
    b.expect("restart");

    // Let both cycles finish.
    wait_state(&fleet, "solo", ServerState::Running).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    wait_state(&fleet, "solo", ServerState::Running).await;
    fleet.orchestrator.shutdown().await;

    // At most two restart cycles: the initial start plus at most two more
    // server.started events.
    let mut started = 0;
    while let Some(envelope) = subscriber.try_recv() {
        if matches!(envelope.event, Event::Started { .. }) {
            started += 1;
        }
    }
    assert!((2..=3).contains(&started), "expected 2..=3 started events, saw {started}");
}
