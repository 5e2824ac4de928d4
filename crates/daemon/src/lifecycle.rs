// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup ordering, signal handling, graceful shutdown.

use crate::env;
use crate::http::{router, AppState};
use crate::rate_limit::{RateLimiter, RateLimiterConfig};
use fs2::FileExt;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tower_config::{Catalog, ConfigError};
use tower_core::SystemClock;
use tower_engine::{EngineError, Orchestrator};
use tower_hub::{EventHub, HubConfig};
use tower_storage::StateStore;
use tracing::{error, info, warn};

/// Default per-request handler timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Daemon configuration, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// JSONC catalog file
    pub config_path: PathBuf,
    /// State/PID/log directory
    pub state_dir: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    /// Treat a corrupt state snapshot as absent instead of fatal
    pub ignore_corrupt_state: bool,
    pub cors_origins: Vec<String>,
    pub rate: RateLimiterConfig,
    pub request_timeout: Duration,
}

impl DaemonConfig {
    /// Resolve from the environment (§ env.rs) with the given config path.
    pub fn from_env(config_path: PathBuf, ignore_corrupt_state: bool) -> Result<Self, DaemonError> {
        let state_dir = env::state_dir().ok_or(DaemonError::NoStateDir)?;
        Ok(Self {
            config_path,
            state_dir,
            api_host: env::api_host(),
            api_port: env::api_port(),
            ignore_corrupt_state,
            cors_origins: env::cors_origins(),
            rate: RateLimiterConfig {
                window_ms: env::rate_limit_window_ms(),
                max_requests: env::rate_limit_max_requests(),
                ..RateLimiterConfig::default()
            },
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("towerd.pid")
    }
}

/// Which signal ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// SIGINT; the CLI exits 130
    Interrupted,
    /// SIGTERM or a clean stop; exit 0
    Terminated,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to acquire pid lock: tower already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("http server exited unexpectedly")]
    ServerExited,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the tower until a signal arrives.
///
/// Startup order: catalog → pid lock → store/hub/orchestrator → listener.
/// `start_all` runs in the background so the API answers during boot; a
/// critical-layer abort leaves the tower serving (the fleet is down, the
/// tower is not).
pub async fn run(config: DaemonConfig) -> Result<ShutdownKind, DaemonError> {
    let (catalog, tuning) = Catalog::load(&config.config_path)?;
    info!(servers = catalog.len(), config = %config.config_path.display(), "catalog loaded");
    if env::dashboard_port() != 3000 {
        info!("DASHBOARD_PORT is set; the tower serves no static assets");
    }

    std::fs::create_dir_all(&config.state_dir)?;

    // Lock first: refuse to race another tower over the same state dir.
    // Avoid truncating before the lock is held.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(config.pid_path())?;
    lock_file.try_lock_exclusive().map_err(DaemonError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let cancel = CancellationToken::new();
    let clock = SystemClock;

    let (hub, _hub_task) = EventHub::spawn(
        HubConfig { heartbeat_interval: tuning.heartbeat_interval(), ..HubConfig::default() },
        clock.clone(),
        cancel.child_token(),
    );

    let mut store = StateStore::new(config.state_file());
    if config.ignore_corrupt_state {
        store = store.ignoring_corrupt();
    }

    let orchestrator = Arc::new(Orchestrator::bootstrap(
        catalog,
        tuning.clone(),
        store,
        hub.clone(),
        clock.clone(),
        cancel.child_token(),
    )?);

    let limiter = Arc::new(RateLimiter::new(config.rate.clone()));
    let _compaction = limiter.spawn_compaction(clock.clone(), cancel.child_token());

    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        hub,
        limiter,
        clock,
        heartbeat_interval: tuning.heartbeat_interval(),
        cancel: cancel.clone(),
    };
    let app = router(state, &config.cors_origins, config.request_timeout);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DaemonError::BindFailed(addr.clone(), e))?;
    info!(%addr, "tower listening");

    // Boot the fleet in the background; the API is already answering.
    let booter = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        match booter.start_all().await {
            Ok(()) => info!("fleet boot complete"),
            Err(e) => error!(error = %e, "fleet boot aborted"),
        }
    });

    let server_cancel = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(server_cancel.cancelled_owned())
        .await
    });

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let kind = tokio::select! {
        _ = sigint.recv() => ShutdownKind::Interrupted,
        _ = sigterm.recv() => ShutdownKind::Terminated,
        _ = &mut server => {
            remove_pid_file(&config);
            return Err(DaemonError::ServerExited);
        }
    };
    info!(?kind, "signal received; stopping fleet");

    // Reverse-layer fleet stop, final snapshot flush, then everything else:
    // cancelling the root token closes WS connections (1013), the hub, the
    // rate limiter sweep, and the HTTP listener.
    orchestrator.shutdown().await;
    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(5), &mut server).await.is_err() {
        warn!("http server did not drain in time");
        server.abort();
    }

    remove_pid_file(&config);
    info!("tower shutdown complete");
    Ok(kind)
}

fn remove_pid_file(config: &DaemonConfig) {
    let path = config.pid_path();
    if path.exists() {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(error = %e, "failed to remove pid file");
        }
    }
}
