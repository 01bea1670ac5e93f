//! App initialization sequencer.
//!
//! DESIGN
//! ======
//! Runs once per process start: restore the session, then kick off the
//! dependent loads a signed-in app needs (wallet balance, mining status).
//! Individual load failures are logged and tolerated — `initialized` is
//! latched `true` regardless of outcome so the UI is never blocked on a
//! flaky backend. `retry_initialization` re-runs the whole sequence with
//! no backoff or attempt limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::client::{ApiClient, Auth};
use crate::error::AuthError;
use crate::session::SessionManager;
use crate::transport::Method;

// =============================================================================
// DEPENDENT-LOAD TYPES
// =============================================================================

/// `data` payload of `GET /wallet/balance`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub total: f64,
    pub available: f64,
    pub pending: f64,
}

/// `data` payload of `GET /mining/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    pub active: bool,
    pub rate_per_hour: f64,
    pub session_earnings: f64,
    pub remaining_secs: u64,
}

// =============================================================================
// SEQUENCER
// =============================================================================

/// Cold-start sequencer gating the rest of the application.
pub struct InitSequencer {
    session: Arc<SessionManager>,
    api: Arc<ApiClient>,
    initialized: AtomicBool,
    balance: RwLock<Option<WalletBalance>>,
    mining: RwLock<Option<MiningStatus>>,
}

impl InitSequencer {
    #[must_use]
    pub fn new(session: Arc<SessionManager>, api: Arc<ApiClient>) -> Self {
        Self {
            session,
            api,
            initialized: AtomicBool::new(false),
            balance: RwLock::new(None),
            mining: RwLock::new(None),
        }
    }

    /// `true` once a run has completed, successfully or not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub async fn balance(&self) -> Option<WalletBalance> {
        self.balance.read().await.clone()
    }

    pub async fn mining_status(&self) -> Option<MiningStatus> {
        self.mining.read().await.clone()
    }

    /// Run the startup sequence. Never fails; the latch is set no matter
    /// what happened.
    pub async fn run(&self) {
        self.session.check_auth_status().await;

        if self.session.is_signed_in().await {
            match self.fetch_balance().await {
                Ok(balance) => *self.balance.write().await = Some(balance),
                Err(e) => tracing::warn!(error = %e, "wallet balance load failed"),
            }
            match self.fetch_mining_status().await {
                Ok(status) => *self.mining.write().await = Some(status),
                Err(e) => tracing::warn!(error = %e, "mining status load failed"),
            }
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(signed_in = self.session.is_signed_in().await, "initialization complete");
    }

    /// Reset the latch and run the sequence again.
    pub async fn retry_initialization(&self) {
        self.initialized.store(false, Ordering::Release);
        self.run().await;
    }

    async fn fetch_balance(&self) -> Result<WalletBalance, AuthError> {
        self.api
            .request_data(Method::Get, "/wallet/balance", None::<&()>, Auth::Bearer)
            .await
    }

    async fn fetch_mining_status(&self) -> Result<MiningStatus, AuthError> {
        self.api
            .request_data(Method::Get, "/mining/status", None::<&()>, Auth::Bearer)
            .await
    }
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
