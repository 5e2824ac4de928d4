// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading: JSONC document → validated server catalog.
//!
//! The document permits `//` and `/* */` comments and trailing commas.
//! Descriptors are strict (unknown fields rejected); unknown top-level keys
//! are ignored so the same file can carry sections for other tools.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod catalog;
mod jsonc;
mod tuning;

pub use catalog::{Catalog, HealthCheck, ServerDescriptor, ServerMetadata};
pub use jsonc::strip_jsonc;
pub use tuning::Tuning;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading failures. Fatal at boot (exit code 1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSONC at byte {position}: {reason}")]
    Syntax { position: usize, reason: String },

    #[error("duplicate key {key:?} at byte {position}")]
    DuplicateKey { key: String, position: usize },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("server {server}: dependency {dependency:?} is not in the catalog")]
    UnknownDependency { server: String, dependency: String },

    #[error(
        "server {server} (layer {layer}) must be in a higher layer than \
         dependency {dependency} (layer {dependency_layer})"
    )]
    LayerOrder { server: String, layer: u32, dependency: String, dependency_layer: u32 },
}
