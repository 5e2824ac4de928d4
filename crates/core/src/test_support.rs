// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and helpers for other crates' tests (feature `test-support`).

use crate::server::{ServerName, ServerRuntime, ServerState};

/// Parse a name that tests know to be valid.
pub fn server_name(name: &str) -> ServerName {
    match ServerName::parse(name) {
        Ok(n) => n,
        Err(e) => unreachable!("invalid test server name {name:?}: {e}"),
    }
}

/// Runtime in a given state with the pid invariant satisfied.
pub fn runtime_in(name: &str, state: ServerState) -> ServerRuntime {
    let mut rt = ServerRuntime::new(server_name(name));
    if state.has_pid() {
        rt.set_active(state, 4242);
    } else {
        rt.set_idle(state);
    }
    rt
}
