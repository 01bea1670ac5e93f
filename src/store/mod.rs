//! Secure token store — platform-conditional key/value persistence.
//!
//! ARCHITECTURE
//! ============
//! Callers see one [`SecureStore`] trait; the backing is selected at
//! runtime. Native builds use the OS credential store via `keyring`; when
//! the keyring is unavailable (headless CI, unsupported desktop) the store
//! degrades to a JSON file in the user config dir. An in-memory backing is
//! provided for tests and embedders that manage persistence themselves.
//!
//! TRADE-OFFS
//! ==========
//! Reads fail silently — a missing or unreadable value is `None`, logged at
//! debug, so a wiped keychain degrades to "signed out" instead of an error.
//! Writes and deletes propagate so callers know persistence is broken.

mod file;
mod keychain;
mod memory;

use std::sync::Arc;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

use crate::error::AuthError;
use crate::types::TokenPair;

/// Key holding the composite access/refresh token pair.
pub const TOKEN_PAIR_KEY: &str = "auth_tokens";
/// Key holding the persisted `{user, isSignedIn}` session blob.
pub const SESSION_KEY: &str = "celf-auth-storage";

/// Native credential-store backends commonly cap individual values around
/// 2KB; larger writes are attempted anyway but logged.
pub const SECURE_VALUE_WARN_BYTES: usize = 2048;

/// Key/value persistence with silent reads and propagating writes.
#[async_trait::async_trait]
pub trait SecureStore: Send + Sync {
    /// Read a value. Any failure degrades to `None`.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the backing rejects the write.
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Delete a value. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the backing rejects the delete.
    async fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// Open the best available backing: OS keyring when it answers a probe,
/// otherwise the file store, otherwise memory.
pub async fn open_default() -> Arc<dyn SecureStore> {
    match KeyringStore::probe().await {
        Ok(store) => {
            tracing::info!("secure store: OS keyring");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "OS keyring unavailable, falling back to file store");
            match FileStore::open_default() {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(error = %e, "file store unavailable, tokens will not persist");
                    Arc::new(MemoryStore::new())
                }
            }
        }
    }
}

// =============================================================================
// TOKEN PAIR (composite value)
// =============================================================================

/// Load the token pair. A corrupt composite reads as absent, forcing
/// re-authentication rather than running with half a pair.
pub async fn load_token_pair(store: &dyn SecureStore) -> Option<TokenPair> {
    let raw = store.get(TOKEN_PAIR_KEY).await?;
    match serde_json::from_str::<TokenPair>(&raw) {
        Ok(pair) => Some(pair),
        Err(e) => {
            tracing::warn!(error = %e, "stored token pair unreadable, treating as absent");
            None
        }
    }
}

/// Persist both tokens as one value; there is no partially-written state.
///
/// # Errors
///
/// Returns [`AuthError::Storage`] when the write fails.
pub async fn save_token_pair(store: &dyn SecureStore, pair: &TokenPair) -> Result<(), AuthError> {
    let raw = serde_json::to_string(pair).map_err(|e| AuthError::Storage(e.to_string()))?;
    store.set(TOKEN_PAIR_KEY, &raw).await
}

/// Delete the token pair.
///
/// # Errors
///
/// Returns [`AuthError::Storage`] when the delete fails.
pub async fn clear_token_pair(store: &dyn SecureStore) -> Result<(), AuthError> {
    store.remove(TOKEN_PAIR_KEY).await
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
