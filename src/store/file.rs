//! File-backed store — the fallback when no OS keyring is available.
//!
//! A single JSON object maps keys to string values, the same shape browser
//! local storage gives the web build. Read-modify-write cycles are
//! serialized through a mutex so concurrent sets cannot drop each other's
//! entries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::Mutex;

use super::SecureStore;
use crate::error::AuthError;

/// Secure store persisted as a JSON map on disk.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, write_lock: Mutex::new(()) }
    }

    /// Open the store at the default location under the user config dir.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when no config directory exists.
    pub fn open_default() -> Result<Self, AuthError> {
        let base = dirs::config_dir().ok_or_else(|| AuthError::Storage("no user config directory".into()))?;
        Ok(Self::new(base.join("celf").join("secure_store.json")))
    }

    async fn read_map(&self) -> BTreeMap<String, String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), error = %e, "store file unreadable");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        let raw = serde_json::to_string(map).map_err(|e| AuthError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SecureStore for FileStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.read_map().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map).await
    }
}
