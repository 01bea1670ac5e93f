//! In-memory store for tests and embedders that persist elsewhere.

use std::collections::HashMap;
use std::sync::Mutex;

use super::SecureStore;
use crate::error::AuthError;

/// Non-persistent secure store. Also usable as a scripted failure source:
/// [`MemoryStore::failing`] makes every set/remove return a storage error
/// while reads keep working.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()), fail_writes: false }
    }

    /// A store whose writes and deletes always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self { entries: Mutex::new(HashMap::new()), fail_writes: true }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        if self.fail_writes {
            return Err(AuthError::Storage("write disabled".into()));
        }
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        if self.fail_writes {
            return Err(AuthError::Storage("delete disabled".into()));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
