// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the integration suite.

#![allow(dead_code)]

pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;
pub use tower_config::{Catalog, HealthCheck, ServerDescriptor, ServerMetadata, Tuning};
pub use tower_core::test_support::server_name;
pub use tower_core::{Event, ServerName, ServerRuntime, ServerState, SystemClock};
pub use tower_daemon::{router, AppState, RateLimiter, RateLimiterConfig};
pub use tower_engine::Orchestrator;
pub use tower_hub::{EventHub, HubConfig, SubscribeOptions};
pub use tower_storage::StateStore;

pub fn descriptor(command: &str, args: &[&str], layer: u32) -> ServerDescriptor {
    ServerDescriptor {
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: BTreeMap::new(),
        metadata: ServerMetadata { layer, ..ServerMetadata::default() },
        health_check: HealthCheck::None,
        grace_period_ms: None,
    }
}

pub fn depends_on(mut descriptor: ServerDescriptor, deps: &[&str]) -> ServerDescriptor {
    descriptor.metadata.dependencies = deps.iter().map(|d| server_name(d)).collect();
    descriptor
}

pub fn fast_tuning() -> Tuning {
    Tuning {
        backoff_initial_ms: 50,
        backoff_max_ms: 200,
        persist_interval_ms: 10,
        ..Tuning::default()
    }
}

/// A bootstrapped fleet with its hub and state file.
pub struct Fleet {
    pub orchestrator: Arc<Orchestrator<SystemClock>>,
    pub hub: EventHub,
    pub cancel: CancellationToken,
    pub state_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

pub fn fleet(catalog: Catalog, tuning: Tuning) -> Fleet {
    let dir = tempfile::tempdir().expect("tempdir");
    let state_path = dir.path().join("state.json");
    let cancel = CancellationToken::new();
    let (hub, _task) =
        EventHub::spawn(HubConfig::default(), SystemClock, cancel.child_token());
    let orchestrator = Orchestrator::bootstrap(
        catalog,
        tuning,
        StateStore::new(&state_path),
        hub.clone(),
        SystemClock,
        cancel.child_token(),
    )
    .expect("bootstrap");
    Fleet { orchestrator: Arc::new(orchestrator), hub, cancel, state_path, _dir: dir }
}

impl Fleet {
    /// HTTP state over this fleet, with the given request budget.
    pub fn app_state(&self, max_requests: u64, window_ms: u64) -> AppState {
        AppState {
            orchestrator: Arc::clone(&self.orchestrator),
            hub: self.hub.clone(),
            limiter: Arc::new(RateLimiter::new(RateLimiterConfig {
                window_ms,
                max_requests,
                skip_paths: vec!["/api/health".to_string()],
            })),
            clock: SystemClock,
            heartbeat_interval: Duration::from_secs(30),
            cancel: self.cancel.clone(),
        }
    }

    pub fn app(&self, max_requests: u64, window_ms: u64) -> axum::Router {
        router(self.app_state(max_requests, window_ms), &[], Duration::from_secs(15))
    }
}

/// Wait until the named server reaches `state`, or panic after 10 s.
pub async fn wait_state(fleet: &Fleet, name: &str, state: ServerState) -> ServerRuntime {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(runtime) = fleet.orchestrator.status_of(name) {
            if runtime.state == state {
                return runtime;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {name} to reach {state}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// GET/POST against the router, returning status and parsed JSON body.
pub async fn request(
    app: &axum::Router,
    method: &str,
    path: &str,
    client: Option<&str>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let mut builder = axum::http::Request::builder().method(method).uri(path);
    if let Some(client) = client {
        builder = builder.header("x-forwarded-for", client);
    }
    let request = builder.body(axum::body::Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
