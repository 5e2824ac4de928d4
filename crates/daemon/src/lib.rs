// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tower daemon: HTTP command/query API, WebSocket gateway, rate
//! limiting, and process-level lifecycle around the fleet engine.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
mod http;
mod lifecycle;
mod logging;
mod rate_limit;
mod ws;

pub use http::{router, AppState};
pub use lifecycle::{run, DaemonConfig, DaemonError, ShutdownKind};
pub use logging::init_logging;
pub use rate_limit::{RateDecision, RateLimiter, RateLimiterConfig};
