// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! marquee-storage: durable scheduler state.
//!
//! One JSON snapshot per destination plus one process-wide registry
//! document. Writes are atomic (`.tmp` + rename) so a crash mid-write
//! leaves the previous snapshot intact. Loads are tolerant: a missing or
//! unreadable file is treated as "no saved state" (the destination is
//! stopped), never as a fatal error.

use marquee_core::{DestinationId, RegistryDoc, SchedulerState};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

const STATE_DIR: &str = "state";
const REGISTRY_FILE: &str = "registry.json";

/// Filesystem-backed store for scheduler snapshots.
#[derive(Debug, Clone)]
pub struct StateStore {
    base_dir: PathBuf,
}

impl StateStore {
    /// Open a store rooted at `base_dir`, creating directories as needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        let state_dir = base_dir.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir)
            .map_err(|source| StorageError::Io { path: state_dir.clone(), source })?;
        Ok(Self { base_dir })
    }

    fn state_path(&self, dest: &DestinationId) -> PathBuf {
        self.base_dir.join(STATE_DIR).join(format!("{}.json", dest))
    }

    fn registry_path(&self) -> PathBuf {
        self.base_dir.join(REGISTRY_FILE)
    }

    /// Load a destination's snapshot.
    ///
    /// Returns `None` for a missing file. An unreadable or unparsable file
    /// also returns `None` after a warning; recovery treats the destination
    /// as stopped rather than refusing to start.
    pub fn load(&self, dest: &DestinationId) -> Option<SchedulerState> {
        let path = self.state_path(dest);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(%dest, path = %path.display(), error = %e, "unreadable state file; treating as stopped");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(%dest, path = %path.display(), error = %e, "corrupt state file; treating as stopped");
                None
            }
        }
    }

    /// Persist a destination's full snapshot atomically.
    pub fn save(&self, dest: &DestinationId, state: &SchedulerState) -> Result<(), StorageError> {
        let path = self.state_path(dest);
        write_atomic(&path, &serde_json::to_vec_pretty(state)?)?;
        tracing::debug!(%dest, path = %path.display(), "state saved");
        Ok(())
    }

    /// Load-modify-save. The mutation sees the current snapshot (or the
    /// default for a new destination); the full document is always written
    /// back, even when nothing changed (`force_save` semantics — the write
    /// refreshes `last_updated` for external watchers).
    pub fn update(
        &self,
        dest: &DestinationId,
        mutate: impl FnOnce(&mut SchedulerState),
    ) -> Result<SchedulerState, StorageError> {
        let mut state = self.load(dest).unwrap_or_default();
        mutate(&mut state);
        state.last_updated = Some(chrono::Utc::now());
        self.save(dest, &state)?;
        Ok(state)
    }

    /// Remove a destination's snapshot, if present.
    pub fn delete(&self, dest: &DestinationId) -> Result<(), StorageError> {
        let path = self.state_path(dest);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Destinations with a saved snapshot, for startup recovery.
    pub fn known_destinations(&self) -> Vec<DestinationId> {
        let state_dir = self.base_dir.join(STATE_DIR);
        let entries = match std::fs::read_dir(&state_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %state_dir.display(), error = %e, "cannot list state dir");
                return Vec::new();
            }
        };
        let mut dests: Vec<DestinationId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let stem = name.strip_suffix(".json")?;
                Some(DestinationId::new(stem))
            })
            .collect();
        dests.sort();
        dests
    }

    /// Load the registry document; a missing or corrupt file yields the
    /// empty registry.
    pub fn load_registry(&self) -> RegistryDoc {
        let path = self.registry_path();
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt registry; starting empty");
                RegistryDoc::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryDoc::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable registry; starting empty");
                RegistryDoc::default()
            }
        }
    }

    /// Persist the registry document atomically.
    pub fn save_registry(&self, doc: &RegistryDoc) -> Result<(), StorageError> {
        write_atomic(&self.registry_path(), &serde_json::to_vec_pretty(doc)?)
    }
}

/// Write via a sibling `.tmp` file and rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)
        .map_err(|source| StorageError::Io { path: tmp.clone(), source })?;
    std::fs::rename(&tmp, path)
        .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
