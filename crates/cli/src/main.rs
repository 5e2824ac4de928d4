// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tower` CLI: run the tower in the foreground, or drive a running one.

mod client;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::exit_code;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "tower", about = "MCP server control tower", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tower in the foreground (default)
    Start {
        /// Path to the JSONC server catalog
        #[arg(long, default_value = "servers.jsonc")]
        config: PathBuf,
        /// Discard an unreadable state snapshot instead of refusing to boot
        #[arg(long)]
        ignore_corrupt_state: bool,
    },
    /// Signal a running tower to shut down
    Stop,
    /// Show the fleet status
    Status,
    /// Check tower liveness
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Start {
        config: PathBuf::from("servers.jsonc"),
        ignore_corrupt_state: false,
    });
    exit_code(run(command))
}

#[tokio::main]
async fn run(command: Command) -> exit_error::Outcome {
    match command {
        Command::Start { config, ignore_corrupt_state } => {
            commands::start(config, ignore_corrupt_state).await
        }
        Command::Stop => commands::stop().await,
        Command::Status => commands::status().await,
        Command::Health => commands::health().await,
    }
}
