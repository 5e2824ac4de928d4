// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process runner: owns one OS child for a single start attempt.
//!
//! Children run in a fresh process group so stop signals reach the whole
//! tree. Stdout and stderr are pumped into one merged line channel; the
//! runner never retries a failed spawn — that policy lives in the
//! supervisor.

use crate::error::StartError;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tower_config::ServerDescriptor;
use tower_core::{Clock, ExitInfo, LogLevel, LogLine, LogStream, ServerName, MAX_LINE_BYTES};
use tracing::debug;

/// Bound of the merged stdout/stderr line channel.
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Spawns configured commands. Stateless; one call per start attempt.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Fork the configured command with merged env and a fresh process
    /// group. Returns as soon as the child exists, with its pid and the
    /// line streams already being pumped.
    pub fn start<C: Clock>(
        &self,
        name: &ServerName,
        descriptor: &ServerDescriptor,
        clock: &C,
    ) -> Result<RunnerHandle, StartError> {
        let mut command = Command::new(&descriptor.command);
        command
            .args(&descriptor.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Descriptor env overlays the tower's own environment.
        for (key, value) in &descriptor.env {
            command.env(key, value);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child =
            command.spawn().map_err(|e| StartError::from_io(&descriptor.command, e))?;

        // Pid is present until the child is reaped; we just spawned it.
        let pid = child
            .id()
            .ok_or_else(|| StartError::Io {
                command: descriptor.command.clone(),
                source: std::io::Error::other("child exited before pid was read"),
            })?;

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(
                stdout,
                name.clone(),
                LogStream::Stdout,
                line_tx.clone(),
                clock.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(
                stderr,
                name.clone(),
                LogStream::Stderr,
                line_tx,
                clock.clone(),
            ));
        }

        debug!(server = %name, pid, command = %descriptor.command, "child spawned");
        Ok(RunnerHandle { pid, child, lines: line_rx })
    }
}

/// A live child from one start attempt.
#[derive(Debug)]
pub struct RunnerHandle {
    pid: u32,
    child: Child,
    lines: mpsc::Receiver<LogLine>,
}

impl RunnerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Next captured output line; `None` after both pipes close.
    pub async fn next_line(&mut self) -> Option<LogLine> {
        self.lines.recv().await
    }

    /// Block until the child exits.
    pub async fn wait<C: Clock>(&mut self, clock: &C) -> ExitInfo {
        let status = self.child.wait().await;
        exit_info(status, clock)
    }

    /// Terminate the whole process group: TERM, then KILL after `grace`.
    /// Returns once the child has been reaped.
    pub async fn stop<C: Clock>(&mut self, grace: Duration, clock: &C) -> ExitInfo {
        stop_child(self.pid, &mut self.child, grace, clock).await
    }

    /// Break the handle into parts so the supervisor can await the child
    /// and the line stream from separate select arms.
    pub(crate) fn split(self) -> (u32, Child, mpsc::Receiver<LogLine>) {
        (self.pid, self.child, self.lines)
    }
}

pub(crate) fn signal_group(pid: u32, signal: Signal) {
    // The child was spawned with its own group; its pgid equals its pid.
    let _ = killpg(Pid::from_raw(pid as i32), signal);
}

/// TERM the group, escalate to KILL after `grace`, and reap.
pub(crate) async fn stop_child<C: Clock>(
    pid: u32,
    child: &mut Child,
    grace: Duration,
    clock: &C,
) -> ExitInfo {
    signal_group(pid, Signal::SIGTERM);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => exit_info(status, clock),
        Err(_) => {
            debug!(pid, "grace elapsed, killing process group");
            signal_group(pid, Signal::SIGKILL);
            exit_info(child.wait().await, clock)
        }
    }
}

pub(crate) fn exit_info<C: Clock>(
    status: std::io::Result<std::process::ExitStatus>,
    clock: &C,
) -> ExitInfo {
    let at = clock.epoch_ms();
    match status {
        Ok(status) => {
            #[cfg(unix)]
            let signal = std::os::unix::process::ExitStatusExt::signal(&status);
            #[cfg(not(unix))]
            let signal = None;
            ExitInfo { code: status.code(), signal, at }
        }
        Err(_) => ExitInfo { code: None, signal: None, at },
    }
}

/// Pump one pipe into the merged line channel.
///
/// Lines are `\n`-delimited; anything past [`MAX_LINE_BYTES`] without a
/// newline is flushed as a piece and the following pieces are flagged as
/// continuations.
async fn pump_lines<R, C>(
    reader: R,
    server: ServerName,
    stream: LogStream,
    tx: mpsc::Sender<LogLine>,
    clock: C,
) where
    R: AsyncRead + Unpin,
    C: Clock,
{
    let mut reader = reader;
    let mut buf: Vec<u8> = Vec::new();
    let mut continuation = false;
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        for segment in chunk[..n].split_inclusive(|b| *b == b'\n') {
            let (data, terminated) = match segment.last() {
                Some(b'\n') => (&segment[..segment.len() - 1], true),
                _ => (segment, false),
            };
            buf.extend_from_slice(data);

            while buf.len() >= MAX_LINE_BYTES {
                let rest = buf.split_off(MAX_LINE_BYTES);
                let piece = std::mem::replace(&mut buf, rest);
                if !send_line(&tx, &server, stream, &clock, piece, continuation).await {
                    return;
                }
                continuation = true;
            }

            if terminated {
                let line = std::mem::take(&mut buf);
                if !send_line(&tx, &server, stream, &clock, line, continuation).await {
                    return;
                }
                continuation = false;
            }
        }
    }

    if !buf.is_empty() {
        let line = std::mem::take(&mut buf);
        let _ = send_line(&tx, &server, stream, &clock, line, continuation).await;
    }
}

async fn send_line<C: Clock>(
    tx: &mpsc::Sender<LogLine>,
    server: &ServerName,
    stream: LogStream,
    clock: &C,
    bytes: Vec<u8>,
    continuation: bool,
) -> bool {
    let mut message = String::from_utf8_lossy(&bytes).into_owned();
    if message.ends_with('\r') {
        message.pop();
    }
    let line = LogLine {
        server: server.clone(),
        stream,
        level: LogLevel::for_stream(stream),
        timestamp: clock.epoch_ms(),
        message,
        continuation,
    };
    tx.send(line).await.is_ok()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
