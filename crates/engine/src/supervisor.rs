// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server supervisor: one task owns one `ServerRuntime`.
//!
//! All mutation happens on this task; operator requests arrive as messages
//! on a bounded inbox and reads go through a `watch` channel. The state
//! machine: stopped → starting → running → {stopping → stopped, restarting
//! → starting, error}, with exponential backoff between restart attempts
//! and health probes that force a restart after enough consecutive
//! failures.

use crate::backoff::restart_delay;
use crate::emitter::EventEmitter;
use crate::health::{self, HealthTracker, HealthVerdict};
use crate::runner::{self, ProcessRunner};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_config::{ServerDescriptor, Tuning};
use tower_core::{
    Clock, Event, ExitInfo, LogLine, ServerName, ServerRuntime, ServerState,
};
use tracing::{info, warn};

/// Inbox bound; commands beyond it apply backpressure to HTTP handlers.
const INBOX_CAPACITY: usize = 16;

/// How long a fresh child must survive before `starting` becomes
/// `running`. An exit inside this window is a failed start attempt, so a
/// crash-looping command never reports `running` to the layer barrier.
const STARTUP_CONFIRMATION: Duration = Duration::from_millis(250);

/// Operator and orchestrator requests to one supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCmd {
    Start {
        /// Operator-initiated starts reset the restart counter
        operator: bool,
    },
    Stop,
    /// Stop then start. Operator-initiated, so restart accounting resets
    Restart,
    /// Stop if active, then end the task
    Shutdown,
}

/// Orchestrator-side handle to a supervisor task.
pub struct SupervisorHandle {
    name: ServerName,
    cmd_tx: mpsc::Sender<SupervisorCmd>,
    runtime_rx: watch::Receiver<ServerRuntime>,
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn name(&self) -> &ServerName {
        &self.name
    }

    /// Current runtime snapshot.
    pub fn runtime(&self) -> ServerRuntime {
        self.runtime_rx.borrow().clone()
    }

    /// Watch for runtime changes (layer barriers, persistence).
    pub fn watch(&self) -> watch::Receiver<ServerRuntime> {
        self.runtime_rx.clone()
    }

    /// Enqueue a command; FIFO with everything else on the inbox.
    pub async fn send(&self, cmd: SupervisorCmd) -> bool {
        self.cmd_tx.send(cmd).await.is_ok()
    }

    /// Wait for the task to end (after `Shutdown`). Reports panics.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.join.await
    }
}

/// Spawn the supervisor task for one descriptor.
pub(crate) fn spawn<C: Clock>(
    name: ServerName,
    descriptor: ServerDescriptor,
    tuning: Tuning,
    initial: ServerRuntime,
    events_tx: mpsc::Sender<Event>,
    clock: C,
    cancel: CancellationToken,
) -> SupervisorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(INBOX_CAPACITY);
    let (runtime_tx, runtime_rx) = watch::channel(initial.clone());
    let runtime_tx = Arc::new(runtime_tx);

    let supervisor = Supervisor {
        name: name.clone(),
        descriptor,
        tuning,
        runner: ProcessRunner,
        runtime: initial,
        runtime_tx: Arc::clone(&runtime_tx),
        emitter: EventEmitter::new(events_tx.clone()),
        health: HealthTracker::default(),
        cmd_rx,
        clock: clock.clone(),
        cancel,
    };

    let guard_name = name.clone();
    let join = tokio::spawn(async move {
        if AssertUnwindSafe(supervisor.run()).catch_unwind().await.is_err() {
            // Panics stay inside the task boundary: demote to error.
            warn!(server = %guard_name, "supervisor task panicked; demoting to error");
            runtime_tx.send_modify(|rt| {
                rt.set_idle(ServerState::Error);
                rt.last_error = Some("supervisor task panicked".to_string());
            });
            let _ = events_tx.try_send(Event::ServerError {
                name: guard_name,
                error: "supervisor task panicked".to_string(),
                at: clock.epoch_ms(),
            });
        }
    });

    SupervisorHandle { name, cmd_tx, runtime_rx, join }
}

/// How a start attempt ended.
enum StartOutcome {
    /// Confirmed up; the running phase owns the child now
    Up { pid: u32, child: Child, lines: mpsc::Receiver<LogLine> },
    /// Spawn failure or exit inside the confirmation window
    Failed,
    /// Operator stop arrived mid-start
    Stopped,
    Shutdown,
}

/// How a running phase ended.
enum RunEnd {
    /// Operator stop completed; back to idle
    Stopped,
    /// Child exited on its own (or health forced a stop); restart policy applies
    Failed,
    /// Operator restart; start again without restart accounting
    RestartRequested,
    /// Cancellation or shutdown command; task should end
    Shutdown,
}

/// How a backoff wait ended.
enum BackoffEnd {
    Elapsed,
    /// Operator start/restart during backoff skips the rest of the delay
    Preempted,
    Stopped,
    Shutdown,
}

struct Supervisor<C: Clock> {
    name: ServerName,
    descriptor: ServerDescriptor,
    tuning: Tuning,
    runner: ProcessRunner,
    runtime: ServerRuntime,
    runtime_tx: Arc<watch::Sender<ServerRuntime>>,
    emitter: EventEmitter,
    health: HealthTracker,
    cmd_rx: mpsc::Receiver<SupervisorCmd>,
    clock: C,
    cancel: CancellationToken,
}

impl<C: Clock> Supervisor<C> {
    async fn run(mut self) {
        let mut flush_tick = tokio::time::interval(Duration::from_millis(100));
        loop {
            let cmd = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = flush_tick.tick(), if self.emitter.has_pending() => {
                    let dropped = self.emitter.flush();
                    self.count_dropped(dropped);
                    continue;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            match cmd {
                SupervisorCmd::Start { operator } => {
                    if operator {
                        self.runtime.restart_count = 0;
                    }
                    if self.lifecycle().await {
                        break;
                    }
                }
                SupervisorCmd::Restart => {
                    // From idle, a restart is just a start.
                    self.runtime.restart_count = 0;
                    if self.lifecycle().await {
                        break;
                    }
                }
                SupervisorCmd::Stop => {
                    // Already idle; nothing to stop.
                }
                SupervisorCmd::Shutdown => break,
            }
        }
    }

    /// One lifecycle: start attempts, the running phase, and restarts,
    /// until the server settles in `stopped` or `error`.
    /// Returns true when the task should end (shutdown/cancel).
    async fn lifecycle(&mut self) -> bool {
        loop {
            match self.start_attempt().await {
                StartOutcome::Up { pid, child, lines } => {
                    match self.running(pid, child, lines).await {
                        RunEnd::Stopped => return false,
                        RunEnd::Shutdown => return true,
                        RunEnd::RestartRequested => continue,
                        RunEnd::Failed => match self.backoff().await {
                            BackoffEnd::Elapsed | BackoffEnd::Preempted => continue,
                            BackoffEnd::Stopped => return false,
                            BackoffEnd::Shutdown => return true,
                        },
                    }
                }
                StartOutcome::Failed => match self.backoff().await {
                    BackoffEnd::Elapsed | BackoffEnd::Preempted => continue,
                    BackoffEnd::Stopped => return false,
                    BackoffEnd::Shutdown => return true,
                },
                StartOutcome::Stopped => return false,
                StartOutcome::Shutdown => return true,
            }
        }
    }

    /// Spawn the child and hold `starting` through the confirmation
    /// window; only a child that survives it counts as `running`.
    async fn start_attempt(&mut self) -> StartOutcome {
        self.set_state(ServerState::Starting);
        let (pid, mut child, mut lines) =
            match self.runner.start(&self.name, &self.descriptor, &self.clock) {
                Ok(handle) => handle.split(),
                Err(e) => {
                    let error = e.to_string();
                    warn!(server = %self.name, error, "start attempt failed");
                    self.runtime.pid = None;
                    self.runtime.last_error = Some(error.clone());
                    self.publish();
                    self.emit(Event::ServerError {
                        name: self.name.clone(),
                        error,
                        at: self.clock.epoch_ms(),
                    });
                    return StartOutcome::Failed;
                }
            };

        self.runtime.pid = Some(pid);
        self.publish();

        let confirmed = tokio::time::sleep(STARTUP_CONFIRMATION);
        tokio::pin!(confirmed);
        let mut lines_open = true;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.stop_child(pid, &mut child).await;
                    return StartOutcome::Shutdown;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SupervisorCmd::Stop) => {
                        self.stop_child(pid, &mut child).await;
                        return StartOutcome::Stopped;
                    }
                    Some(SupervisorCmd::Shutdown) | None => {
                        self.stop_child(pid, &mut child).await;
                        return StartOutcome::Shutdown;
                    }
                    // Already mid-start; nothing to do.
                    Some(SupervisorCmd::Start { .. }) | Some(SupervisorCmd::Restart) => {}
                },
                exit = child.wait() => {
                    // Exited before the start was confirmed.
                    let exit = runner::exit_info(exit, &self.clock);
                    self.drain_lines(&mut lines);
                    self.record_exit(exit);
                    self.runtime.last_error = Some(format_exit_error(&exit));
                    self.publish();
                    warn!(
                        server = %self.name,
                        code = ?exit.code,
                        "child exited during startup confirmation"
                    );
                    return StartOutcome::Failed;
                }
                line = lines.recv(), if lines_open => match line {
                    Some(line) => self.emit_log(line),
                    None => lines_open = false,
                },
                _ = &mut confirmed => break,
            }
        }

        self.set_state(ServerState::Running);
        self.runtime.started_at = Some(self.clock.epoch_ms());
        self.runtime.last_error = None;
        self.health.reset();
        self.publish();
        info!(server = %self.name, pid, "server running");
        self.emit(Event::Started { name: self.name.clone(), pid, at: self.clock.epoch_ms() });
        StartOutcome::Up { pid, child, lines }
    }

    /// The running phase: owns the child until it stops one way or another.
    async fn running(
        &mut self,
        pid: u32,
        mut child: Child,
        mut lines: mpsc::Receiver<LogLine>,
    ) -> RunEnd {
        let mut health_interval = tokio::time::interval(self.tuning.health_check_interval());
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        health_interval.tick().await; // immediate first tick

        let count_reset = tokio::time::sleep(self.tuning.restart_count_reset_after());
        tokio::pin!(count_reset);
        let mut reset_armed = self.runtime.restart_count > 0;

        let mut flush_tick = tokio::time::interval(Duration::from_millis(100));
        let mut lines_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.stop_child(pid, &mut child).await;
                    return RunEnd::Shutdown;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SupervisorCmd::Stop) => {
                        self.stop_child(pid, &mut child).await;
                        return RunEnd::Stopped;
                    }
                    Some(SupervisorCmd::Restart) => {
                        self.runtime.restart_count = 0;
                        self.stop_child(pid, &mut child).await;
                        return RunEnd::RestartRequested;
                    }
                    Some(SupervisorCmd::Start { .. }) => {
                        // Already running; the API layer answers 409 before
                        // this can normally happen.
                    }
                    Some(SupervisorCmd::Shutdown) | None => {
                        self.stop_child(pid, &mut child).await;
                        return RunEnd::Shutdown;
                    }
                },
                exit = child.wait() => {
                    let exit = runner::exit_info(exit, &self.clock);
                    self.drain_lines(&mut lines);
                    self.record_exit(exit);
                    warn!(
                        server = %self.name,
                        code = ?exit.code,
                        signal = ?exit.signal,
                        "server exited unexpectedly"
                    );
                    self.runtime.last_error = Some(format_exit_error(&exit));
                    self.publish();
                    return RunEnd::Failed;
                }
                line = lines.recv(), if lines_open => match line {
                    Some(line) => self.emit_log(line),
                    // Pipes closed; the exit surfaces via wait()
                    None => lines_open = false,
                },
                _ = health_interval.tick() => {
                    if self.run_health_probe().await {
                        // Quiet stop: the restart shows up as
                        // running → restarting, like an unexpected exit.
                        self.reap_child(pid, &mut child).await;
                        return RunEnd::Failed;
                    }
                }
                _ = &mut count_reset, if reset_armed => {
                    info!(server = %self.name, "sustained running; resetting restart count");
                    self.runtime.restart_count = 0;
                    self.publish();
                    reset_armed = false;
                }
                _ = flush_tick.tick(), if self.emitter.has_pending() => {
                    let dropped = self.emitter.flush();
                    self.count_dropped(dropped);
                }
            }
        }
    }

    /// Run one probe; true means the threshold fired and a restart is due.
    async fn run_health_probe(&mut self) -> bool {
        let healthy = health::probe(&self.descriptor.health_check, true).await;
        match self.health.record(healthy, self.tuning.unhealthy_threshold) {
            HealthVerdict::Unchanged => false,
            HealthVerdict::Changed(state) => {
                self.runtime.health_state = state;
                self.publish();
                self.emit(Event::HealthUpdated {
                    name: self.name.clone(),
                    health_state: state,
                    at: self.clock.epoch_ms(),
                });
                false
            }
            HealthVerdict::RestartNeeded => {
                self.runtime.health_state = tower_core::HealthState::Unhealthy;
                self.runtime.last_error = Some("health probe threshold exceeded".to_string());
                self.publish();
                self.emit(Event::HealthUpdated {
                    name: self.name.clone(),
                    health_state: tower_core::HealthState::Unhealthy,
                    at: self.clock.epoch_ms(),
                });
                warn!(server = %self.name, "unhealthy threshold reached; restarting");
                true
            }
        }
    }

    /// Graceful stop of the live child: stopping → stopped with the exit
    /// reported via `server.stopped`.
    async fn stop_child(&mut self, pid: u32, child: &mut Child) {
        self.set_state(ServerState::Stopping);
        let exit = runner::stop_child(pid, child, self.grace(), &self.clock).await;
        self.record_exit(exit);
        self.set_state(ServerState::Stopped);
    }

    /// Stop and reap without the stopping/stopped transitions; used when the
    /// outcome is a restart, so clients see running → restarting.
    async fn reap_child(&mut self, pid: u32, child: &mut Child) {
        let exit = runner::stop_child(pid, child, self.grace(), &self.clock).await;
        self.record_exit(exit);
        self.publish();
    }

    fn grace(&self) -> Duration {
        self.descriptor
            .grace_period_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.tuning.stop_grace())
    }

    /// Wait out the restart backoff, or settle in `error` when the cap is
    /// reached.
    async fn backoff(&mut self) -> BackoffEnd {
        if self.runtime.restart_count >= self.tuning.max_restarts {
            warn!(
                server = %self.name,
                restarts = self.runtime.restart_count,
                "restart cap reached; entering error state"
            );
            self.set_state(ServerState::Error);
            return BackoffEnd::Stopped;
        }

        self.set_state(ServerState::Restarting);
        let delay = restart_delay(
            self.tuning.backoff_initial(),
            self.tuning.backoff_max(),
            self.runtime.restart_count,
        );
        info!(server = %self.name, ?delay, attempt = self.runtime.restart_count + 1, "restart scheduled");

        let end = tokio::select! {
            _ = tokio::time::sleep(delay) => BackoffEnd::Elapsed,
            _ = self.cancel.cancelled() => BackoffEnd::Shutdown,
            cmd = self.cmd_rx.recv() => match cmd {
                Some(SupervisorCmd::Stop) => BackoffEnd::Stopped,
                Some(SupervisorCmd::Shutdown) | None => BackoffEnd::Shutdown,
                Some(SupervisorCmd::Start { operator }) => {
                    if operator {
                        self.runtime.restart_count = 0;
                    }
                    BackoffEnd::Preempted
                }
                Some(SupervisorCmd::Restart) => {
                    self.runtime.restart_count = 0;
                    BackoffEnd::Preempted
                }
            },
        };
        match end {
            BackoffEnd::Elapsed => {
                self.runtime.restart_count += 1;
                self.publish();
                BackoffEnd::Elapsed
            }
            BackoffEnd::Stopped | BackoffEnd::Shutdown => {
                self.set_state(ServerState::Stopped);
                end
            }
            BackoffEnd::Preempted => end,
        }
    }

    fn record_exit(&mut self, exit: ExitInfo) {
        self.runtime.last_exit = Some(exit);
        self.emit(Event::Stopped {
            name: self.name.clone(),
            code: exit.code,
            signal: exit.signal,
            at: exit.at,
        });
    }

    /// Transition with the pid invariant and a `server.state_changed` event.
    fn set_state(&mut self, to: ServerState) {
        let from = self.runtime.state;
        if from == to {
            return;
        }
        if to.has_pid() {
            match self.runtime.pid {
                Some(pid) => self.runtime.set_active(to, pid),
                // Starting has no pid yet; runner.start fills it in.
                None if to == ServerState::Starting => {
                    self.runtime.state = to;
                }
                None => self.runtime.state = to,
            }
        } else {
            self.runtime.set_idle(to);
        }
        self.publish();
        self.emit(Event::StateChanged { name: self.name.clone(), from, to, at: self.clock.epoch_ms() });
    }

    fn emit(&mut self, event: Event) {
        let dropped = self.emitter.emit(event);
        self.count_dropped(dropped);
    }

    fn emit_log(&mut self, line: LogLine) {
        let event = Event::Log {
            name: line.server,
            stream: line.stream,
            message: line.message,
            at: line.timestamp,
        };
        let dropped = self.emitter.emit(event);
        self.count_dropped(dropped);
    }

    fn count_dropped(&mut self, dropped: u64) {
        if dropped > 0 {
            self.runtime.dropped_log_count += dropped;
            self.publish();
        }
    }

    fn drain_lines(&mut self, lines: &mut mpsc::Receiver<LogLine>) {
        while let Ok(line) = lines.try_recv() {
            self.emit_log(line);
        }
    }

    fn publish(&self) {
        self.runtime_tx.send_replace(self.runtime.clone());
    }
}

fn format_exit_error(exit: &ExitInfo) -> String {
    match (exit.code, exit.signal) {
        (Some(code), _) => format!("exited with code {code}"),
        (None, Some(signal)) => format!("killed by signal {signal}"),
        (None, None) => "exited".to_string(),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
