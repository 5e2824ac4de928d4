// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet-level reconciler: owns the supervisors, enforces tiered
//! startup/shutdown, relays supervisor events to the hub, and persists
//! runtime state through the store.
//!
//! Control flow is one-directional: supervisors emit into the
//! orchestrator's event channel; the relay task forwards to the hub and
//! never calls back into a supervisor.

use crate::error::{BootError, CommandError, EngineError};
use crate::supervisor::{self, SupervisorCmd, SupervisorHandle};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tower_config::{Catalog, Tuning};
use tower_core::{Clock, Event, ServerName, ServerRuntime, ServerState};
use tower_hub::EventHub;
use tower_storage::{PersistedServer, StateSnapshot, StateStore};
use tracing::{info, warn};

/// Bound of the supervisors → relay event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Aggregate counts for `GET /api/servers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FleetStats {
    pub running: usize,
    pub stopped: usize,
    pub error: usize,
    pub total: usize,
}

/// Fleet coordinator. Shared behind `Arc` by the HTTP/WS layer.
pub struct Orchestrator<C: Clock> {
    supervisors: IndexMap<ServerName, SupervisorHandle>,
    catalog: Catalog,
    tuning: Tuning,
    cancel: CancellationToken,
    _clock: C,
}

impl<C: Clock> Orchestrator<C> {
    /// Register one supervisor per descriptor and reconcile persisted state.
    ///
    /// Persisted `running`/`starting` entries are demoted to `stopped`: the
    /// previous tower's children are in separate process groups and the
    /// recorded pid is advisory, so nothing is probed. Restart counters and
    /// last errors carry over until the next `running` transition.
    pub fn bootstrap(
        catalog: Catalog,
        tuning: Tuning,
        store: StateStore,
        hub: EventHub,
        clock: C,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        let persisted = store.load()?.map(|snapshot| snapshot.servers).unwrap_or_default();

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut supervisors = IndexMap::new();
        for (name, descriptor) in catalog.iter() {
            let mut initial = ServerRuntime::new(name.clone());
            if let Some(previous) = persisted.get(name.as_str()) {
                initial.restart_count = previous.restart_count;
                initial.last_error = previous.last_error.clone();
                if previous.state.has_pid() {
                    info!(
                        server = %name,
                        previous = %previous.state,
                        "reconciled persisted state to stopped"
                    );
                }
            }
            let handle = supervisor::spawn(
                name.clone(),
                descriptor.clone(),
                tuning.clone(),
                initial,
                events_tx.clone(),
                clock.clone(),
                cancel.child_token(),
            );
            supervisors.insert(name.clone(), handle);
        }

        let watches: Vec<(ServerName, watch::Receiver<ServerRuntime>)> =
            supervisors.iter().map(|(name, handle)| (name.clone(), handle.watch())).collect();
        tokio::spawn(relay_loop(
            events_rx,
            hub,
            store,
            watches,
            tuning.persist_interval(),
            cancel.clone(),
        ));

        Ok(Self { supervisors, catalog, tuning, cancel, _clock: clock })
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Runtime snapshots in catalog order. No mutation.
    pub fn status(&self) -> Vec<ServerRuntime> {
        self.supervisors.values().map(SupervisorHandle::runtime).collect()
    }

    pub fn status_of(&self, name: &str) -> Option<ServerRuntime> {
        self.supervisors.get(name).map(SupervisorHandle::runtime)
    }

    pub fn stats(&self) -> FleetStats {
        let mut stats = FleetStats::default();
        for handle in self.supervisors.values() {
            stats.total += 1;
            match handle.runtime().state {
                ServerState::Running => stats.running += 1,
                ServerState::Error => stats.error += 1,
                _ => stats.stopped += 1,
            }
        }
        stats
    }

    /// Operator start. 409 when already running or starting.
    pub async fn start(&self, name: &str) -> Result<(), CommandError> {
        let handle = self.require(name)?;
        match handle.runtime().state {
            ServerState::Running | ServerState::Starting => {
                Err(CommandError::AlreadyRunning(handle.name().clone()))
            }
            _ => self.enqueue(handle, SupervisorCmd::Start { operator: true }).await,
        }
    }

    /// Operator stop. 409 when already stopped.
    pub async fn stop(&self, name: &str) -> Result<(), CommandError> {
        let handle = self.require(name)?;
        match handle.runtime().state {
            ServerState::Stopped => Err(CommandError::AlreadyStopped(handle.name().clone())),
            _ => self.enqueue(handle, SupervisorCmd::Stop).await,
        }
    }

    /// Operator restart: stop then start, serialized FIFO on the
    /// supervisor's inbox so concurrent requests collapse.
    pub async fn restart(&self, name: &str) -> Result<(), CommandError> {
        let handle = self.require(name)?;
        self.enqueue(handle, SupervisorCmd::Restart).await
    }

    /// Drive every `autoStart` server up, one layer at a time.
    ///
    /// A layer completes when each started member settles in `running` or
    /// `error`. A critical member in `error` aborts the boot and rolls the
    /// already-started layers back down in reverse order.
    pub async fn start_all(&self) -> Result<(), BootError> {
        let boot_timeout = self.tuning.boot_timeout();
        match tokio::time::timeout(boot_timeout, self.start_layers()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("boot timed out; stopping started servers");
                self.stop_all().await;
                Err(BootError::Timeout(boot_timeout))
            }
        }
    }

    async fn start_layers(&self) -> Result<(), BootError> {
        for (layer, members) in self.catalog.layers() {
            let mut started = Vec::new();
            for name in &members {
                let auto_start = self
                    .catalog
                    .get(name.as_str())
                    .map(|d| d.metadata.auto_start)
                    .unwrap_or(false);
                if !auto_start {
                    continue;
                }
                if let Some(handle) = self.supervisors.get(name.as_str()) {
                    handle.send(SupervisorCmd::Start { operator: false }).await;
                    started.push(name.clone());
                }
            }

            // Layer barrier: every started member settles before the next
            // layer begins.
            for name in &started {
                let Some(handle) = self.supervisors.get(name.as_str()) else { continue };
                let mut rx = handle.watch();
                let runtime = {
                    let settled = rx.wait_for(|rt| rt.state.settles_start()).await;
                    match settled {
                        Ok(runtime) => runtime.clone(),
                        Err(_) => continue,
                    }
                };
                drop(rx);
                if runtime.state == ServerState::Error {
                    let critical = self
                        .catalog
                        .get(name.as_str())
                        .map(|d| d.metadata.critical)
                        .unwrap_or(false);
                    if critical {
                        warn!(server = %name, "critical server failed; rolling back boot");
                        self.stop_all().await;
                        return Err(BootError::CriticalFailed {
                            name: name.clone(),
                            error: runtime
                                .last_error
                                .unwrap_or_else(|| "failed to start".to_string()),
                        });
                    }
                    warn!(server = %name, layer, "non-critical server failed during boot");
                }
            }
            info!(layer, servers = started.len(), "layer started");
        }
        Ok(())
    }

    /// Stop every active server, reverse layer order, bounded by the
    /// shutdown timeout. Supervisors escalate to force-kill on their own.
    pub async fn stop_all(&self) {
        if tokio::time::timeout(self.tuning.shutdown_timeout(), self.stop_layers())
            .await
            .is_err()
        {
            warn!("shutdown timed out; supervisors force-kill on their own grace");
        }
    }

    async fn stop_layers(&self) {
        let mut layers = self.catalog.layers();
        layers.reverse();
        for (layer, members) in layers {
            let mut stopping = Vec::new();
            for name in members.iter().rev() {
                let Some(handle) = self.supervisors.get(name.as_str()) else { continue };
                if handle.runtime().state.is_terminal() {
                    continue;
                }
                handle.send(SupervisorCmd::Stop).await;
                stopping.push(name.clone());
            }
            for name in &stopping {
                let Some(handle) = self.supervisors.get(name.as_str()) else { continue };
                let mut rx = handle.watch();
                let _ = rx.wait_for(|rt| rt.state.is_terminal()).await;
            }
            if !stopping.is_empty() {
                info!(layer, servers = stopping.len(), "layer stopped");
            }
        }
    }

    /// Graceful teardown: stop the fleet, then cancel the supervisor tasks
    /// and the relay (which flushes a final snapshot).
    pub async fn shutdown(&self) {
        self.stop_all().await;
        self.cancel.cancel();
    }

    fn require(&self, name: &str) -> Result<&SupervisorHandle, CommandError> {
        self.supervisors
            .get(name)
            .ok_or_else(|| CommandError::UnknownServer(name.to_string()))
    }

    async fn enqueue(
        &self,
        handle: &SupervisorHandle,
        cmd: SupervisorCmd,
    ) -> Result<(), CommandError> {
        if handle.send(cmd).await {
            Ok(())
        } else {
            Err(CommandError::ShuttingDown(handle.name().clone()))
        }
    }
}

/// Forward supervisor events to the hub and persist on state changes,
/// throttled to one write per `persist_interval`, with a final flush when
/// the channel closes or the tower shuts down.
async fn relay_loop(
    mut events_rx: mpsc::Receiver<Event>,
    hub: EventHub,
    store: StateStore,
    watches: Vec<(ServerName, watch::Receiver<ServerRuntime>)>,
    persist_interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut dirty = false;
    let mut last_save = tokio::time::Instant::now() - persist_interval;

    loop {
        let flush_at = last_save + persist_interval;
        tokio::select! {
            maybe = events_rx.recv() => match maybe {
                Some(event) => {
                    let persist = event.is_state_changed();
                    hub.publish(event).await;
                    if persist {
                        if last_save.elapsed() >= persist_interval {
                            save_snapshot(&store, &watches);
                            last_save = tokio::time::Instant::now();
                        } else {
                            dirty = true;
                        }
                    }
                }
                None => break,
            },
            _ = tokio::time::sleep_until(flush_at), if dirty => {
                save_snapshot(&store, &watches);
                last_save = tokio::time::Instant::now();
                dirty = false;
            }
            _ = cancel.cancelled() => break,
        }
    }

    // Final flush so a clean shutdown always lands on disk.
    save_snapshot(&store, &watches);
}

fn save_snapshot(
    store: &StateStore,
    watches: &[(ServerName, watch::Receiver<ServerRuntime>)],
) {
    let mut servers = BTreeMap::new();
    for (name, rx) in watches {
        servers.insert(name.clone(), PersistedServer::from_runtime(&rx.borrow()));
    }
    if let Err(e) = store.save(&StateSnapshot::new(servers)) {
        warn!(error = %e, "failed to persist state snapshot");
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
