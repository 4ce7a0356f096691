// ABOUTME: Key/value blob store used to persist rep counters, workout history, and generated plans
// ABOUTME: In-memory and JSON-file backends plus a typed SessionStore facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Local Store
//!
//! Values are opaque JSON strings keyed by name, matching the blobs earlier
//! clients wrote. [`SessionStore`] layers typed access for counters and
//! history on top and tolerates blobs it cannot parse by falling back to
//! empty values.

use crate::constants::storage;
use crate::errors::{AppError, AppResult};
use crate::models::{RepCounters, WorkoutHistory, WorkoutRecord};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persistent string blobs keyed by name
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the blob stored under `key`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be written
    fn set(&self, key: &str, value: String) -> AppResult<()>;

    /// Delete the blob stored under `key`
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be written
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk, written through on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a JSON
    /// object of strings
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let mut entries = DashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => {}
            Ok(contents) => {
                let stored: BTreeMap<String, String> =
                    serde_json::from_str(&contents).map_err(|e| {
                        AppError::storage(format!("{} is not a valid store: {e}", path.display()))
                    })?;
                entries.extend(stored);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file does not exist yet");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, entries })
    }

    /// Location on disk
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> AppResult<()> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let contents = serde_json::to_string_pretty(&snapshot)?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, contents)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.entries.insert(key.to_owned(), value);
        self.flush()
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Typed access to the session blobs
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Wrap a key/value store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored counters, zero when absent or unreadable
    #[must_use]
    pub fn load_counters(&self) -> RepCounters {
        self.load_json::<RepCounters>(storage::COUNTERS_KEY)
            .unwrap_or_default()
    }

    /// Stored history, empty when absent or unreadable
    #[must_use]
    pub fn load_history(&self) -> WorkoutHistory {
        self.load_json::<Vec<WorkoutRecord>>(storage::HISTORY_KEY)
            .map(WorkoutHistory::from_records)
            .unwrap_or_default()
    }

    /// Persist counters
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails
    pub fn save_counters(&self, counters: RepCounters) -> AppResult<()> {
        self.store
            .set(storage::COUNTERS_KEY, serde_json::to_string(&counters)?)
    }

    /// Persist history
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails
    pub fn save_history(&self, history: &WorkoutHistory) -> AppResult<()> {
        self.store
            .set(storage::HISTORY_KEY, serde_json::to_string(history)?)
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Could not read stored value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable stored value");
                None
            }
        }
    }
}
