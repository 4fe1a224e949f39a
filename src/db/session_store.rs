// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local key-value store for session data.
//!
//! Backed by a single JSON object on disk. Writes go to a temporary file
//! that is renamed over the original, so a crash mid-write leaves the
//! previous session intact.

use crate::db::keys;
use crate::error::AppError;
use crate::models::Racer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persistent key-value store.
#[derive(Clone)]
pub struct SessionStore {
    /// `None` in mock mode: nothing touches the filesystem
    path: Option<PathBuf>,
    entries: Arc<Mutex<Map<String, Value>>>,
}

impl SessionStore {
    /// Open the store at `path`, creating it lazily on first write.
    ///
    /// An unreadable or corrupt file is treated as an empty session.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt session store, starting empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened session store");

        Ok(Self {
            path: Some(path),
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// In-memory store for tests.
    pub fn new_mock() -> Self {
        Self {
            path: None,
            entries: Arc::new(Mutex::new(Map::new())),
        }
    }

    /// Read and deserialize a value.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| AppError::Storage(format!("Invalid value for {}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Store a value and persist.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::Storage(format!("Failed to serialize {}: {}", key, e)))?;

        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    /// Remove a value and persist. Removing a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries).await
    }

    async fn persist(&self, entries: &Map<String, Value>) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_vec_pretty(entries)
            .map_err(|e| AppError::Storage(format!("Failed to serialize store: {}", e)))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }

    // ─── Racer ───────────────────────────────────────────────────

    pub async fn load_racer(&self) -> Result<Option<Racer>, AppError> {
        self.get(keys::RACER).await
    }

    pub async fn save_racer(&self, racer: &Racer) -> Result<(), AppError> {
        self.set(keys::RACER, racer).await
    }

    /// Forget the logged-in racer.
    pub async fn clear_racer(&self) -> Result<(), AppError> {
        self.remove(keys::RACER).await
    }
}
