// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart on crash: a server that always exits caps its restarts and
//! settles in `error`.

use super::prelude::*;

#[tokio::test]
async fn crash_loop_caps_at_max_restarts() {
    let catalog = Catalog::from_descriptors([(
        server_name("gamma"),
        descriptor("sh", &["-c", "exit 1"], 0),
    )])
    .expect("catalog");
    let tuning = Tuning { backoff_initial_ms: 50, ..fast_tuning() };
    let fleet = fleet(catalog, tuning);
    let subscriber = fleet.hub.subscribe(SubscribeOptions::default());

    let begun = tokio::time::Instant::now();
    fleet.orchestrator.start("gamma").await.expect("start");
    let errored = wait_state(&fleet, "gamma", ServerState::Error).await;
    assert!(begun.elapsed() < Duration::from_secs(5), "crash loop should settle quickly");

    // restartCount caps at maxRestarts.
    assert_eq!(errored.restart_count, 3);
    assert!(errored.last_error.is_some());

    fleet.cancel.cancel();
    let mut stopped = 0;
    loop {
        match subscriber.recv().await {
            Some(envelope) => {
                if matches!(envelope.event, Event::Stopped { .. }) {
                    stopped += 1;
                }
            }
            None => break,
        }
    }
    // Four exits: the initial run plus three restarts.
    assert_eq!(stopped, 4);
}
