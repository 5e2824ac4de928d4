// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state recovery: a tower that dies with servers running comes
//! back with them reconciled to `stopped`, errors preserved until the next
//! `running` transition.

use super::prelude::*;
use tower_storage::{PersistedServer, StateSnapshot};

fn delta_catalog() -> Catalog {
    Catalog::from_descriptors([(server_name("delta"), descriptor("sleep", &["3600"], 0))])
        .expect("catalog")
}

#[tokio::test]
async fn killed_tower_reconciles_to_stopped_on_next_boot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state_path = dir.path().join("state.json");

    // First boot: start delta and wait for the persister to record it.
    {
        let cancel = CancellationToken::new();
        let (hub, _task) =
            EventHub::spawn(HubConfig::default(), SystemClock, cancel.child_token());
        let orchestrator = Orchestrator::bootstrap(
            delta_catalog(),
            fast_tuning(),
            StateStore::new(&state_path),
            hub,
            SystemClock,
            cancel.child_token(),
        )
        .expect("bootstrap");
        orchestrator.start_all().await.expect("boot");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(Some(snapshot)) = StateStore::new(&state_path).load() {
                if snapshot.servers.get("delta").map(|s| s.state) == Some(ServerState::Running) {
                    break;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "running state never persisted");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // SIGKILL equivalent: no stop_all, no final flush ordering.
        cancel.cancel();
    }

    // Second boot from the same state file: delta is stopped, the advisory
    // pid is gone, and the autostart policy brings it back up.
    let cancel = CancellationToken::new();
    let (hub, _task) = EventHub::spawn(HubConfig::default(), SystemClock, cancel.child_token());
    let orchestrator = Orchestrator::bootstrap(
        delta_catalog(),
        fast_tuning(),
        StateStore::new(&state_path),
        hub,
        SystemClock,
        cancel.child_token(),
    )
    .expect("bootstrap");

    let delta = orchestrator.status_of("delta").expect("delta registered");
    assert_eq!(delta.state, ServerState::Stopped);
    assert!(delta.pid.is_none());

    orchestrator.start_all().await.expect("reboot");
    assert_eq!(orchestrator.status_of("delta").map(|rt| rt.state), Some(ServerState::Running));
    orchestrator.shutdown().await;
}

#[tokio::test]
async fn last_error_survives_until_the_next_running_transition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state_path = dir.path().join("state.json");

    // Hand the new tower a snapshot recorded before the "crash".
    let mut servers = std::collections::BTreeMap::new();
    servers.insert(
        server_name("delta"),
        PersistedServer {
            state: ServerState::Running,
            pid: Some(99_999),
            started_at: Some(1_000),
            restart_count: 2,
            last_error: Some("probe timeout before crash".to_string()),
        },
    );
    StateStore::new(&state_path).save(&StateSnapshot::new(servers)).expect("seed snapshot");

    let cancel = CancellationToken::new();
    let (hub, _task) = EventHub::spawn(HubConfig::default(), SystemClock, cancel.child_token());
    let orchestrator = Orchestrator::bootstrap(
        delta_catalog(),
        fast_tuning(),
        StateStore::new(&state_path),
        hub,
        SystemClock,
        cancel.child_token(),
    )
    .expect("bootstrap");

    // Reconciled: stopped, advisory pid dropped, error and counter kept.
    let delta = orchestrator.status_of("delta").expect("delta registered");
    assert_eq!(delta.state, ServerState::Stopped);
    assert!(delta.pid.is_none());
    assert_eq!(delta.restart_count, 2);
    assert_eq!(delta.last_error.as_deref(), Some("probe timeout before crash"));

    // The next successful start clears the stale error.
    orchestrator.start("delta").await.expect("start");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let runtime = orchestrator.status_of("delta").expect("delta registered");
        if runtime.state == ServerState::Running {
            assert_eq!(runtime.last_error, None);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "delta never ran");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    orchestrator.shutdown().await;
    drop(dir);
}
