//! Auth session manager.
//!
//! ARCHITECTURE
//! ============
//! Owns the signed-in/signed-out state machine and every credential
//! operation: sign-in, sign-up, sign-out, cold-start restore, silent
//! refresh, profile updates. Tokens themselves live in the secure store
//! and are never inspected here — only their presence matters.
//!
//! Auth-mutating operations are serialized through one mutex, so two rapid
//! `sign_in` calls run in sequence instead of racing on shared state. Read
//! accessors never take that lock.
//!
//! TRADE-OFFS
//! ==========
//! `sign_out` tears down local state even when the backend logout call
//! fails — a network blip must never leave a stale authenticated session.
//! A failed silent refresh degrades to the signed-out state with no
//! user-facing error; expired sessions end quietly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::client::{ApiClient, Auth};
use crate::error::AuthError;
use crate::store::{self, SESSION_KEY, SecureStore};
use crate::transport::Method;
use crate::types::{
    ChangePasswordRequest, LoginData, LoginRequest, ProfileData, RegisterRequest, TokenPair, UpdateProfileRequest,
    User,
};

pub const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// STATE
// =============================================================================

/// Lifecycle phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    SignedOut,
    Authenticating,
    SignedIn,
    Refreshing,
}

/// Observable session state.
///
/// Invariant: `is_signed_in == true` implies `user.is_some()`.
/// `is_loading` and `error` are process-local — they reset to
/// `{false, None}` on restart and are never persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_signed_in: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub phase: SessionPhase,
}

/// The `{user, isSignedIn}` subset written to the secure store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    user: Option<User>,
    is_signed_in: bool,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Orchestrates credential exchange, token persistence, and session state.
pub struct SessionManager {
    api: Arc<ApiClient>,
    store: Arc<dyn SecureStore>,
    state: RwLock<SessionState>,
    /// Serializes auth-mutating operations (sign-in/out, restore, refresh).
    op_lock: Mutex<()>,
}

impl SessionManager {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        let store = api.store().clone();
        Self {
            api,
            store,
            state: RwLock::new(SessionState::default()),
            op_lock: Mutex::new(()),
        }
    }

    /// Current state, copied out. Never blocks on in-flight operations.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.state.read().await.is_signed_in
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    /// Errors are cleared explicitly by the caller, never auto-expired.
    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    // =========================================================================
    // SIGN IN / SIGN UP
    // =========================================================================

    /// Exchange credentials for a token pair and establish the session.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] before any network call for malformed
    /// input; otherwise the gateway's taxonomy. On any failure the state
    /// returns to signed-out with `error` set, and the error is returned
    /// for the caller to display.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if let Err(e) = validate_credentials(email, password) {
            self.record_failure(&e).await;
            return Err(e);
        }

        let _guard = self.op_lock.lock().await;
        self.begin(SessionPhase::Authenticating).await;

        let result: Result<LoginData, AuthError> = self
            .api
            .request_data(Method::Post, "/auth/login", Some(&LoginRequest { email, password }), Auth::Public)
            .await;

        match result {
            Ok(data) => {
                let pair = TokenPair {
                    access_token: data.access_token,
                    refresh_token: data.refresh_token,
                };
                if let Err(e) = store::save_token_pair(self.store.as_ref(), &pair).await {
                    self.record_failure(&e).await;
                    return Err(e);
                }
                self.establish(data.user.clone()).await;
                tracing::info!(email, "signed in");
                Ok(data.user)
            }
            Err(e) => {
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    /// Register a new account. Success does NOT establish a session — the
    /// caller must follow up with an explicit [`SessionManager::sign_in`].
    ///
    /// # Errors
    ///
    /// Same surface as [`SessionManager::sign_in`].
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), AuthError> {
        if let Err(e) = validate_registration(email, password, first_name, last_name) {
            self.record_failure(&e).await;
            return Err(e);
        }

        let _guard = self.op_lock.lock().await;
        self.begin(SessionPhase::Authenticating).await;

        let result = self
            .api
            .request_ack(
                Method::Post,
                "/auth/register",
                Some(&RegisterRequest { email, password, first_name, last_name }),
                Auth::Public,
            )
            .await;

        match result {
            Ok(()) => {
                // No tokens, no user: registration leaves the machine signed out.
                self.reset().await;
                tracing::info!(email, "account registered");
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    // =========================================================================
    // SIGN OUT
    // =========================================================================

    /// End the session. The backend logout call is best-effort; local
    /// teardown is unconditional and authoritative.
    pub async fn sign_out(&self) {
        let _guard = self.op_lock.lock().await;
        self.state.write().await.is_loading = true;
        self.teardown().await;
    }

    /// Teardown body shared with the forced sign-out path. Caller holds the
    /// op lock.
    async fn teardown(&self) {
        if let Err(e) = self
            .api
            .request_ack(Method::Post, "/auth/logout", None::<&()>, Auth::Bearer)
            .await
        {
            tracing::warn!(error = %e, "backend logout failed, clearing local session anyway");
        }

        if let Err(e) = store::clear_token_pair(self.store.as_ref()).await {
            tracing::warn!(error = %e, "failed to clear stored tokens");
        }
        if let Err(e) = self.store.remove(SESSION_KEY).await {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }

        self.reset().await;
        tracing::info!("signed out");
    }

    // =========================================================================
    // RESTORE / REFRESH
    // =========================================================================

    /// Validate any stored session at process start. Never returns an
    /// error: every failure degrades to the signed-out state. With no
    /// stored tokens this makes zero network calls.
    pub async fn check_auth_status(&self) {
        let _guard = self.op_lock.lock().await;

        if store::load_token_pair(self.store.as_ref()).await.is_none() {
            if let Err(e) = self.store.remove(SESSION_KEY).await {
                tracing::warn!(error = %e, "failed to clear persisted session");
            }
            self.reset().await;
            return;
        }

        self.begin(SessionPhase::Refreshing).await;
        match self.fetch_profile().await {
            Ok(user) => {
                self.establish(user).await;
                tracing::info!("session restored");
            }
            Err(e) => {
                tracing::info!(error = %e, "stored session invalid, signing out");
                if let Err(e) = store::clear_token_pair(self.store.as_ref()).await {
                    tracing::warn!(error = %e, "failed to clear stored tokens");
                }
                if let Err(e) = self.store.remove(SESSION_KEY).await {
                    tracing::warn!(error = %e, "failed to clear persisted session");
                }
                self.reset().await;
            }
        }
    }

    /// Silent refresh: re-fetch the profile (the gateway mints a new access
    /// token under the covers if the current one has expired). On failure
    /// the session is torn down quietly — no user-facing error.
    pub async fn refresh_auth(&self) {
        let _guard = self.op_lock.lock().await;
        self.begin(SessionPhase::Refreshing).await;

        match self.fetch_profile().await {
            Ok(user) => self.establish(user).await,
            Err(e) => {
                tracing::info!(error = %e, "session refresh failed, forcing sign-out");
                self.teardown().await;
            }
        }
    }

    /// Rehydrate the persisted `{user, isSignedIn}` subset without touching
    /// the network. `is_loading`/`error` always come back as `{false, None}`.
    pub async fn restore_persisted(&self) {
        let Some(raw) = self.store.get(SESSION_KEY).await else {
            return;
        };
        let persisted: PersistedSession = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "persisted session unreadable, ignoring");
                return;
            }
        };

        let mut state = self.state.write().await;
        // uphold the invariant even against a hand-edited blob
        let signed_in = persisted.is_signed_in && persisted.user.is_some();
        state.user = persisted.user;
        state.is_signed_in = signed_in;
        state.is_loading = false;
        state.error = None;
        state.phase = if signed_in { SessionPhase::SignedIn } else { SessionPhase::SignedOut };
    }

    // =========================================================================
    // PROFILE OPERATIONS
    // =========================================================================

    /// Update the user's name. Brackets `is_loading`/`error` only — no
    /// state-machine transition.
    ///
    /// # Errors
    ///
    /// Gateway taxonomy; [`AuthError::Validation`] for empty names.
    pub async fn update_profile(&self, first_name: &str, last_name: &str) -> Result<User, AuthError> {
        if let Err(e) = validate_names(first_name, last_name) {
            self.record_failure_soft(&e).await;
            return Err(e);
        }

        self.bracket_start().await;
        let result: Result<ProfileData, AuthError> = self
            .api
            .request_data(
                Method::Patch,
                "/users/profile",
                Some(&UpdateProfileRequest { first_name, last_name }),
                Auth::Bearer,
            )
            .await;

        match result {
            Ok(data) => {
                {
                    let mut state = self.state.write().await;
                    state.user = Some(data.user.clone());
                    state.is_loading = false;
                }
                self.persist_current().await;
                Ok(data.user)
            }
            Err(e) => {
                self.handle_bearer_failure(&e).await;
                Err(e)
            }
        }
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for empty fields, a too-short new
    /// password, or a confirmation mismatch; otherwise the gateway taxonomy.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        if let Err(e) = validate_password_change(current_password, new_password, confirm_password) {
            self.record_failure_soft(&e).await;
            return Err(e);
        }

        self.bracket_start().await;
        let result = self
            .api
            .request_ack(
                Method::Post,
                "/auth/change-password",
                Some(&ChangePasswordRequest { current_password, new_password }),
                Auth::Bearer,
            )
            .await;

        match result {
            Ok(()) => {
                self.state.write().await.is_loading = false;
                Ok(())
            }
            Err(e) => {
                self.handle_bearer_failure(&e).await;
                Err(e)
            }
        }
    }

    // =========================================================================
    // STATE TRANSITIONS
    // =========================================================================

    async fn begin(&self, phase: SessionPhase) {
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
        state.phase = phase;
    }

    async fn bracket_start(&self) {
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
    }

    async fn establish(&self, user: User) {
        {
            let mut state = self.state.write().await;
            state.user = Some(user);
            state.is_signed_in = true;
            state.is_loading = false;
            state.error = None;
            state.phase = SessionPhase::SignedIn;
        }
        self.persist_current().await;
    }

    /// Full reset to the signed-out defaults.
    async fn reset(&self) {
        *self.state.write().await = SessionState::default();
    }

    /// Auth-operation failure: record the message and fall back to signed out.
    async fn record_failure(&self, e: &AuthError) {
        let mut state = self.state.write().await;
        state.user = None;
        state.is_signed_in = false;
        state.is_loading = false;
        state.error = Some(e.to_string());
        state.phase = SessionPhase::SignedOut;
    }

    /// Profile-operation failure: record the message, keep the session.
    async fn record_failure_soft(&self, e: &AuthError) {
        let mut state = self.state.write().await;
        state.is_loading = false;
        state.error = Some(e.to_string());
    }

    /// Failure of a bearer operation outside the auth state machine. When
    /// the gateway deleted the token pair (refresh token rejected), the
    /// session is dead and must be torn down, not left looking signed in;
    /// any other failure just records the message.
    async fn handle_bearer_failure(&self, e: &AuthError) {
        if self.session_revoked(e).await {
            tracing::info!("tokens revoked during request, forcing sign-out");
            let _guard = self.op_lock.lock().await;
            self.teardown().await;
        } else {
            self.record_failure_soft(e).await;
        }
    }

    /// `true` when an authentication failure coincides with a cleared token
    /// pair on a session that still thinks it is signed in.
    async fn session_revoked(&self, e: &AuthError) -> bool {
        e.is_auth()
            && self.state.read().await.is_signed_in
            && store::load_token_pair(self.store.as_ref()).await.is_none()
    }

    async fn fetch_profile(&self) -> Result<User, AuthError> {
        let data: ProfileData = self
            .api
            .request_data(Method::Get, "/users/profile", None::<&()>, Auth::Bearer)
            .await?;
        Ok(data.user)
    }

    /// Write the `{user, isSignedIn}` subset. Persistence failure is logged,
    /// never fatal — the in-memory session is already correct.
    async fn persist_current(&self) {
        let (user, is_signed_in) = {
            let state = self.state.read().await;
            (state.user.clone(), state.is_signed_in)
        };
        let blob = PersistedSession { user, is_signed_in };
        match serde_json::to_string(&blob) {
            Ok(raw) => {
                if let Err(e) = self.store.set(SESSION_KEY, &raw).await {
                    tracing::warn!(error = %e, "failed to persist session");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode session"),
        }
    }
}

// =============================================================================
// VALIDATION (pre-flight, never reaches the network)
// =============================================================================

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    validate_password(password)
}

fn validate_registration(email: &str, password: &str, first_name: &str, last_name: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    validate_password(password)?;
    validate_names(first_name, last_name)
}

fn validate_password_change(current: &str, new: &str, confirm: &str) -> Result<(), AuthError> {
    if current.trim().is_empty() {
        return Err(AuthError::Validation("current password is required".into()));
    }
    if new.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if new != confirm {
        return Err(AuthError::Validation("passwords do not match".into()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::Validation("email is required".into()));
    }
    // shape check only; the backend owns real address validation
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AuthError::Validation("email address is invalid".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("password is required".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_names(first_name: &str, last_name: &str) -> Result<(), AuthError> {
    if first_name.trim().is_empty() {
        return Err(AuthError::Validation("first name is required".into()));
    }
    if last_name.trim().is_empty() {
        return Err(AuthError::Validation("last name is required".into()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
