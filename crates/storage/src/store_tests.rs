// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::snapshot::{PersistedServer, StateSnapshot};
use std::collections::BTreeMap;
use tower_core::test_support::{runtime_in, server_name};
use tower_core::ServerState;

fn sample_snapshot() -> StateSnapshot {
    let mut servers = BTreeMap::new();
    let mut runtime = runtime_in("alpha", ServerState::Running);
    runtime.restart_count = 1;
    servers.insert(server_name("alpha"), PersistedServer::from_runtime(&runtime));
    servers.insert(
        server_name("beta"),
        PersistedServer::from_runtime(&runtime_in("beta", ServerState::Stopped)),
    );
    StateSnapshot::new(servers)
}

#[test]
fn load_missing_file_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn save_then_load_is_structural_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let snapshot = sample_snapshot();
    store.save(&snapshot).unwrap();
    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn save_replaces_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    store.save(&sample_snapshot()).unwrap();

    let mut second = sample_snapshot();
    second.servers.remove("beta");
    store.save(&second).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.servers.len(), 1);
    assert!(!dir.path().join("state.tmp").exists());
}

#[test]
fn corrupt_snapshot_is_fatal_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let store = StateStore::new(&path);
    assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
}

#[test]
fn corrupt_snapshot_can_be_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let store = StateStore::new(&path).ignoring_corrupt();
    assert!(store.load().unwrap().is_none());
}

#[test]
fn future_schema_follows_corrupt_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        br#"{ "schemaVersion": 99, "savedAt": "2026-01-01T00:00:00Z", "servers": {} }"#,
    )
    .unwrap();

    assert!(matches!(StateStore::new(&path).load(), Err(StoreError::Corrupt(_))));
    assert!(StateStore::new(&path).ignoring_corrupt().load().unwrap().is_none());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nested/state/state.json"));
    store.save(&StateSnapshot::empty()).unwrap();
    assert!(store.load().unwrap().is_some());
}
