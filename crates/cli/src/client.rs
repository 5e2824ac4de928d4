// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for a running tower.

use anyhow::{anyhow, Context};
use std::time::Duration;
use tower_wire::{HealthResponse, ServersResponse};

/// Base URL of the local tower; honors `API_PORT`.
pub fn base_url() -> String {
    format!("http://127.0.0.1:{}", tower_daemon::env::api_port())
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_default()
}

pub async fn fetch_servers() -> anyhow::Result<ServersResponse> {
    let url = format!("{}/api/servers", base_url());
    let response = http().get(&url).send().await.context("is the tower running?")?;
    if !response.status().is_success() {
        return Err(anyhow!("tower answered {}", response.status()));
    }
    Ok(response.json().await?)
}

pub async fn fetch_health() -> anyhow::Result<HealthResponse> {
    let url = format!("{}/api/health", base_url());
    let response = http().get(&url).send().await.context("is the tower running?")?;
    Ok(response.json().await?)
}
