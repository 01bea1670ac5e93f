//! Client SDK for the CELF backend API.
//!
//! Owns the session/auth lifecycle: credential exchange, secure token
//! persistence, silent refresh-on-401, forced sign-out, and the cold-start
//! sequence that gates dependent data loads. Everything is injected
//! explicitly — there is no global session singleton, so embedders and
//! tests compose their own context.

pub mod client;
pub mod config;
pub mod error;
pub mod init;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

use std::sync::Arc;

pub use client::{ApiClient, Auth};
pub use config::ClientConfig;
pub use error::AuthError;
pub use init::{InitSequencer, MiningStatus, WalletBalance};
pub use session::{SessionManager, SessionPhase, SessionState};
pub use store::SecureStore;
pub use types::{TokenPair, User};

/// Fully wired client context: gateway, session manager, and sequencer
/// sharing one secure store.
pub struct AppContext {
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionManager>,
    pub init: Arc<InitSequencer>,
}

impl AppContext {
    /// Wire a context from environment configuration and the best
    /// available secure-store backing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub async fn from_env() -> Result<Self, AuthError> {
        let config = ClientConfig::from_env();
        let store = store::open_default().await;
        Self::with_store(&config, store)
    }

    /// Wire a context over an explicit config and store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn with_store(config: &ClientConfig, store: Arc<dyn SecureStore>) -> Result<Self, AuthError> {
        let api = Arc::new(ApiClient::new(config, store)?);
        let session = Arc::new(SessionManager::new(api.clone()));
        let init = Arc::new(InitSequencer::new(session.clone(), api.clone()));
        Ok(Self { api, session, init })
    }
}
