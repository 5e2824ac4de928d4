// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP command/query surface.
//!
//! Write endpoints are asynchronous: a 202 means the command was accepted
//! into the supervisor's inbox; effects show up on the WebSocket channel.

use crate::rate_limit::{RateDecision, RateLimiter};
use crate::ws;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_core::{Clock, SystemClock};
use tower_engine::{CommandError, FleetStats, Orchestrator};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_hub::EventHub;
use tower_wire::{
    AcceptedResponse, ApiError, HealthResponse, ServerEntry, ServersResponse, StatsSummary,
};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator<SystemClock>>,
    pub hub: EventHub,
    pub limiter: Arc<RateLimiter>,
    pub clock: SystemClock,
    /// WS heartbeat cadence; timeout is twice this
    pub heartbeat_interval: Duration,
    /// Daemon-wide shutdown; WS connections close 1013 when it fires
    pub cancel: CancellationToken,
}

/// Build the full router: API routes, `/ws`, rate limiting, CORS, and the
/// per-request timeout.
pub fn router(state: AppState, origins: &[String], request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/servers", get(list_servers))
        .route("/api/servers/{name}", get(get_server))
        .route("/api/servers/{name}/start", post(start_server))
        .route("/api/servers/{name}/stop", post(stop_server))
        .route("/api/servers/{name}/restart", post(restart_server))
        .route("/api/stats/rate-limit", get(rate_limit_stats))
        .route("/ws", get(ws::upgrade))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(cors_layer(origins))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let list: Vec<HeaderValue> =
            origins.iter().filter_map(|origin| origin.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(list))
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.clock.epoch_ms()))
}

async fn list_servers(State(state): State<AppState>) -> Json<ServersResponse> {
    let servers = state
        .orchestrator
        .status()
        .into_iter()
        .map(|runtime| entry(&state, runtime))
        .collect();
    Json(ServersResponse { servers, stats: summarize(state.orchestrator.stats()) })
}

async fn get_server(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.orchestrator.status_of(&name) {
        Some(runtime) => Json(entry(&state, runtime)).into_response(),
        None => not_found().await.into_response(),
    }
}

async fn start_server(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    accepted(state.orchestrator.start(&name).await)
}

async fn stop_server(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    accepted(state.orchestrator.stop(&name).await)
}

async fn restart_server(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    accepted(state.orchestrator.restart(&name).await)
}

async fn rate_limit_stats(State(state): State<AppState>) -> Response {
    Json(state.limiter.stats(state.clock.epoch_ms())).into_response()
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError::new("not_found")))
}

fn accepted(result: Result<(), CommandError>) -> Response {
    match result {
        Ok(()) => (StatusCode::ACCEPTED, Json(AcceptedResponse::yes())).into_response(),
        Err(CommandError::UnknownServer(_)) => {
            (StatusCode::NOT_FOUND, Json(ApiError::new("not_found"))).into_response()
        }
        Err(e @ (CommandError::AlreadyRunning(_) | CommandError::AlreadyStopped(_))) => {
            let mut body = ApiError::new("conflict");
            body.details = Some(e.to_string());
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        Err(CommandError::ShuttingDown(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new("unavailable"))).into_response()
        }
    }
}

fn entry(state: &AppState, runtime: tower_core::ServerRuntime) -> ServerEntry {
    let (layer, critical) = state
        .orchestrator
        .catalog()
        .get(runtime.name.as_str())
        .map(|d| (d.metadata.layer, d.metadata.critical))
        .unwrap_or((0, false));
    ServerEntry::from_runtime(
        runtime,
        layer,
        critical,
        state.orchestrator.tuning().health_check_interval_ms,
    )
}

fn summarize(stats: FleetStats) -> StatsSummary {
    StatsSummary {
        running: stats.running,
        stopped: stats.stopped,
        error: stats.error,
        total: stats.total,
    }
}

/// Client key: first `X-Forwarded-For` token, then `X-Real-Ip`, then the
/// socket peer address.
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    let decision = state.limiter.check(&client, req.uri().path(), state.clock.epoch_ms());
    match decision {
        RateDecision::Skipped => next.run(req).await,
        RateDecision::Allowed { limit, remaining, reset_secs } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            insert_num(headers, "x-ratelimit-limit", limit);
            insert_num(headers, "x-ratelimit-remaining", remaining);
            insert_num(headers, "x-ratelimit-reset", reset_secs);
            response
        }
        RateDecision::Limited { limit, retry_after_secs } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ApiError::rate_limited(retry_after_secs)),
            )
                .into_response();
            let headers = response.headers_mut();
            insert_num(headers, "retry-after", retry_after_secs);
            insert_num(headers, "x-ratelimit-limit", limit);
            insert_num(headers, "x-ratelimit-remaining", 0);
            insert_num(headers, "x-ratelimit-reset", retry_after_secs);
            response
        }
    }
}

fn insert_num(headers: &mut axum::http::HeaderMap, name: &'static str, value: u64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
