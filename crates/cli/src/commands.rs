// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommand implementations.

use crate::client;
use crate::exit_error::Outcome;
use crate::output;
use anyhow::{anyhow, Context};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::time::Duration;
use tower_daemon::{env, DaemonConfig};

/// Run the tower in the foreground until a signal arrives.
pub async fn start(config: PathBuf, ignore_corrupt_state: bool) -> Outcome {
    let daemon_config = match DaemonConfig::from_env(config, ignore_corrupt_state) {
        Ok(config) => config,
        Err(e) => return Outcome::from_daemon(Err(e)),
    };
    let _log_guard = tower_daemon::init_logging(
        &env::log_level(),
        env::log_to_file(),
        &daemon_config.state_dir,
    );
    Outcome::from_daemon(tower_daemon::run(daemon_config).await)
}

/// SIGTERM the pid-file holder and wait for it to exit.
pub async fn stop() -> Outcome {
    Outcome::from_result(stop_inner().await)
}

async fn stop_inner() -> anyhow::Result<()> {
    let state_dir = env::state_dir().ok_or_else(|| anyhow!("no state directory"))?;
    let pid_path = state_dir.join("towerd.pid");
    let raw = std::fs::read_to_string(&pid_path)
        .with_context(|| format!("no running tower ({} missing)", pid_path.display()))?;
    let pid: i32 = raw.trim().parse().context("malformed pid file")?;
    let pid = Pid::from_raw(pid);

    kill(pid, Signal::SIGTERM).context("failed to signal the tower")?;
    for _ in 0..50 {
        // Signal 0 probes liveness without sending anything.
        if kill(pid, None).is_err() {
            println!("tower stopped");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!("tower did not exit within 5s"))
}

/// Render `GET /api/servers`.
pub async fn status() -> Outcome {
    Outcome::from_result(async {
        let response = client::fetch_servers().await?;
        print!("{}", output::render_status(&response));
        Ok(())
    }
    .await)
}

/// Render `GET /api/health`.
pub async fn health() -> Outcome {
    Outcome::from_result(async {
        let response = client::fetch_health().await?;
        println!("{}", response.status);
        Ok(())
    }
    .await)
}
