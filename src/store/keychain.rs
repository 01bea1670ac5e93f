//! OS credential-store backing via the `keyring` crate.
//!
//! Keyring calls are blocking platform APIs, so every operation runs under
//! `spawn_blocking`. Values beyond the common native size cap are written
//! anyway but logged — splitting or compressing is out of scope.

use keyring::Entry;

use super::{SECURE_VALUE_WARN_BYTES, SecureStore};
use crate::error::AuthError;

const SERVICE: &str = "celf-client";
const PROBE_KEY: &str = "celf-store-probe";

/// Secure store backed by the platform keychain / credential manager.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    #[must_use]
    pub fn new() -> Self {
        Self { service: SERVICE.to_string() }
    }

    /// Open the keyring only if a write/delete probe round-trips.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the platform keyring rejects the
    /// probe (no daemon, locked keychain, unsupported platform).
    pub async fn probe() -> Result<Self, AuthError> {
        let store = Self::new();
        store.set(PROBE_KEY, "ok").await?;
        store.remove(PROBE_KEY).await?;
        Ok(store)
    }

    fn entry(&self, key: &str) -> Result<Entry, AuthError> {
        Entry::new(&self.service, key).map_err(|e| AuthError::Storage(e.to_string()))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SecureStore for KeyringStore {
    async fn get(&self, key: &str) -> Option<String> {
        let service = self.service.clone();
        let key_owned = key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            Entry::new(&service, &key_owned).and_then(|e| e.get_password())
        })
        .await;

        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(keyring::Error::NoEntry)) => None,
            Ok(Err(e)) => {
                tracing::debug!(key, error = %e, "keyring read failed");
                None
            }
            Err(e) => {
                tracing::debug!(key, error = %e, "keyring read task failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        if value.len() > SECURE_VALUE_WARN_BYTES {
            tracing::warn!(key, len = value.len(), "secure value exceeds native size cap, write may fail");
        }
        let entry = self.entry(key)?;
        let value_owned = value.to_string();
        tokio::task::spawn_blocking(move || entry.set_password(&value_owned))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let entry = self.entry(key)?;
        let result = tokio::task::spawn_blocking(move || entry.delete_credential())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        match result {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }
}
