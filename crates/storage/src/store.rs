// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic snapshot reads and writes.

use crate::snapshot::StateSnapshot;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is corrupt: {0}")]
    Corrupt(String),
}

/// Single-writer snapshot store backed by one file.
///
/// Callers serialize `save`; the orchestrator's persister task is the only
/// writer in the running tower.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    /// Treat an unreadable snapshot as absent instead of fatal
    ignore_corrupt: bool,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ignore_corrupt: false }
    }

    /// Boot policy for `--ignore-corrupt-state`.
    pub fn ignoring_corrupt(mut self) -> Self {
        self.ignore_corrupt = true;
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the last fully-written snapshot, if any.
    ///
    /// After a crash this returns either the previous complete document or
    /// `None`; a torn write is impossible because `save` renames over the
    /// target only after fsync.
    pub fn load(&self) -> Result<Option<StateSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let parsed: Result<StateSnapshot, _> = serde_json::from_slice(&bytes);
        let snapshot = match parsed {
            Ok(snapshot) => snapshot.migrate(),
            Err(e) => {
                return self.corrupt(format!("unparseable snapshot: {e}"));
            }
        };
        match snapshot {
            Some(snapshot) => Ok(Some(snapshot)),
            None => self.corrupt("snapshot schema is newer than this tower".to_string()),
        }
    }

    fn corrupt(&self, reason: String) -> Result<Option<StateSnapshot>, StoreError> {
        if self.ignore_corrupt {
            warn!(path = %self.path.display(), reason, "discarding corrupt state snapshot");
            Ok(None)
        } else {
            Err(StoreError::Corrupt(reason))
        }
    }

    /// Write the snapshot atomically: `<path>.tmp` + fsync + rename.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Corrupt(format!("unserializable snapshot: {e}")))?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
