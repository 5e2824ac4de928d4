// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server catalog: typed descriptors parsed out of `mcp.servers`.

use crate::jsonc::{check_duplicate_keys, strip_jsonc};
use crate::tuning::Tuning;
use crate::ConfigError;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tower_core::ServerName;

/// Immutable definition of one managed server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerDescriptor {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overlays the tower's own environment; descriptor entries win.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: ServerMetadata,
    #[serde(default)]
    pub health_check: HealthCheck,
    /// Per-server stop grace before force-kill, overriding the tuning default
    #[serde(default)]
    pub grace_period_ms: Option<u64>,
}

/// Orchestration metadata for a descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerMetadata {
    /// Startup layer: ascending on boot, descending on shutdown.
    /// Must be strictly greater than every dependency's layer.
    #[serde(default)]
    pub layer: u32,
    #[serde(default)]
    pub dependencies: BTreeSet<ServerName>,
    /// A critical server failing during boot aborts the whole boot
    #[serde(default)]
    pub critical: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self { layer: 0, dependencies: BTreeSet::new(), critical: false, auto_start: true }
    }
}

fn default_true() -> bool {
    true
}

/// Health probe configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum HealthCheck {
    /// No probing; health stays `unknown`
    #[default]
    None,
    /// The child process being alive counts as healthy
    Process,
    /// TCP dial succeeds within the probe timeout
    #[serde(rename_all = "camelCase")]
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    mcp: McpSection,
}

#[derive(Debug, Default, Deserialize)]
struct McpSection {
    #[serde(default)]
    servers: IndexMap<ServerName, ServerDescriptor>,
    #[serde(default)]
    orchestrator: Tuning,
}

/// Validated, ordered set of server descriptors.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    servers: IndexMap<ServerName, ServerDescriptor>,
}

impl Catalog {
    /// Load and validate a JSONC config file.
    pub fn load(path: &Path) -> Result<(Self, Tuning), ConfigError> {
        let bytes = std::fs::read(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&bytes)
    }

    /// Parse and validate a JSONC document.
    pub fn parse(bytes: &[u8]) -> Result<(Self, Tuning), ConfigError> {
        let stripped = strip_jsonc(bytes)?;
        check_duplicate_keys(&stripped)?;
        let doc: RawDocument = serde_json::from_slice(&stripped)?;
        let catalog = Self { servers: doc.mcp.servers };
        catalog.validate()?;
        Ok((catalog, doc.mcp.orchestrator))
    }

    /// Build a catalog from already-typed descriptors (tests, embedding).
    pub fn from_descriptors(
        servers: impl IntoIterator<Item = (ServerName, ServerDescriptor)>,
    ) -> Result<Self, ConfigError> {
        let catalog = Self { servers: servers.into_iter().collect() };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, descriptor) in &self.servers {
            for dep in &descriptor.metadata.dependencies {
                let Some(dep_descriptor) = self.servers.get(dep) else {
                    return Err(ConfigError::UnknownDependency {
                        server: name.to_string(),
                        dependency: dep.to_string(),
                    });
                };
                let (layer, dep_layer) =
                    (descriptor.metadata.layer, dep_descriptor.metadata.layer);
                // layer(x) > layer(y) for every dependency also rules out cycles
                if layer <= dep_layer {
                    return Err(ConfigError::LayerOrder {
                        server: name.to_string(),
                        layer,
                        dependency: dep.to_string(),
                        dependency_layer: dep_layer,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServerName, &ServerDescriptor)> {
        self.servers.iter()
    }

    /// Distinct layers in ascending order, each with its members in
    /// catalog order.
    pub fn layers(&self) -> Vec<(u32, Vec<ServerName>)> {
        let mut by_layer: BTreeMap<u32, Vec<ServerName>> = BTreeMap::new();
        for (name, descriptor) in &self.servers {
            by_layer.entry(descriptor.metadata.layer).or_default().push(name.clone());
        }
        by_layer.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
