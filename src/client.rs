//! API gateway client.
//!
//! ARCHITECTURE
//! ============
//! One wrapper owns bearer attachment, envelope decoding, and the silent
//! token-refresh protocol. A 401 on an authenticated call triggers at most
//! one refresh and one retry of the original request; the guard is a
//! boolean on the request loop, so retries can never cascade. The refresh
//! itself is single-flight behind a mutex — concurrent 401s wait for the
//! first refresh and reuse its result instead of stampeding the backend.
//!
//! TRADE-OFFS
//! ==========
//! A refresh rejected by the backend clears the stored pair (the session is
//! dead either way); a refresh that merely failed to reach the backend
//! leaves the pair in place so a later call can try again.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::store::{self, SecureStore};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
use crate::types::{ApiEnvelope, RefreshData, RefreshRequest, TokenPair};

/// Whether a call carries the stored access token.
///
/// Public endpoints (login, register, refresh) never attach a bearer and a
/// 401 from them is final — credential rejection, not token expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Bearer,
    Public,
}

/// HTTP client for the CELF API.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    store: Arc<dyn SecureStore>,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    /// Build a client over the real network transport.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &ClientConfig, store: Arc<dyn SecureStore>) -> Result<Self, AuthError> {
        let transport = Arc::new(ReqwestTransport::new(config.timeouts)?);
        Ok(Self::with_transport(config, store, transport))
    }

    /// Build a client over an explicit transport (tests use a scripted mock).
    #[must_use]
    pub fn with_transport(config: &ClientConfig, store: Arc<dyn SecureStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SecureStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // =========================================================================
    // PUBLIC REQUEST SURFACE
    // =========================================================================

    /// Issue a request and decode the envelope's `data` payload.
    ///
    /// # Errors
    ///
    /// [`AuthError::Authentication`] for 4xx or `success=false`,
    /// [`AuthError::Network`] when unreachable, [`AuthError::Server`] for
    /// 5xx or a malformed body.
    pub async fn request_data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
        auth: Auth,
    ) -> Result<T, AuthError> {
        let response = self.execute(method, path, body, auth).await?;
        let status = response.status;
        let envelope: ApiEnvelope<T> = decode_envelope(&response)?;
        envelope.data.ok_or_else(|| AuthError::Server {
            status,
            message: "response missing data payload".into(),
        })
    }

    /// Issue a request where only the envelope's `success` flag matters.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`ApiClient::request_data`].
    pub async fn request_ack(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
        auth: Auth,
    ) -> Result<(), AuthError> {
        let response = self.execute(method, path, body, auth).await?;
        let _: ApiEnvelope<serde_json::Value> = decode_envelope(&response)?;
        Ok(())
    }

    // =========================================================================
    // REQUEST LOOP (retry-once)
    // =========================================================================

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
        auth: Auth,
    ) -> Result<HttpResponse, AuthError> {
        let body = match body {
            Some(b) => Some(serde_json::to_value(b).map_err(|e| AuthError::Server {
                status: 0,
                message: format!("body encode failed: {e}"),
            })?),
            None => None,
        };

        // Single boolean, not a counter: at most one refresh-and-retry.
        let mut retried = false;
        loop {
            let bearer = match auth {
                Auth::Bearer => self.access_token().await,
                Auth::Public => None,
            };
            let response = self
                .transport
                .send(HttpRequest {
                    method,
                    url: self.url(path),
                    bearer: bearer.clone(),
                    body: body.clone(),
                })
                .await?;

            if response.status == 401 && auth == Auth::Bearer && !retried {
                retried = true;
                match self.refresh_access_token(bearer.as_deref()).await {
                    Ok(()) => continue,
                    Err(e) => {
                        if e.is_auth() {
                            // Refresh token rejected: the session is dead.
                            self.clear_tokens().await;
                        } else {
                            tracing::warn!(error = %e, "token refresh did not complete");
                        }
                        // Propagate the original 401 as the final error.
                        return Ok(response);
                    }
                }
            }

            return Ok(response);
        }
    }

    async fn access_token(&self) -> Option<String> {
        store::load_token_pair(self.store.as_ref())
            .await
            .map(|pair| pair.access_token)
    }

    async fn clear_tokens(&self) {
        if let Err(e) = store::clear_token_pair(self.store.as_ref()).await {
            tracing::warn!(error = %e, "failed to clear stored tokens");
        }
    }

    // =========================================================================
    // REFRESH PROTOCOL
    // =========================================================================

    /// Mint a new access token from the stored refresh token and rewrite the
    /// composite pair. Single-flight: callers queue on the lock, and a caller
    /// whose failed bearer no longer matches the stored pair returns
    /// immediately — someone else already refreshed.
    async fn refresh_access_token(&self, failed_bearer: Option<&str>) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let pair = store::load_token_pair(self.store.as_ref())
            .await
            .ok_or_else(|| AuthError::Authentication("no refresh token available".into()))?;

        if let Some(failed) = failed_bearer {
            if failed != pair.access_token {
                return Ok(());
            }
        }

        let body = serde_json::to_value(RefreshRequest { refresh_token: &pair.refresh_token })
            .map_err(|e| AuthError::Server { status: 0, message: format!("body encode failed: {e}") })?;
        let response = self
            .transport
            .send(HttpRequest {
                method: Method::Post,
                url: self.url("/auth/refresh-token"),
                bearer: None,
                body: Some(body),
            })
            .await?;

        let envelope: ApiEnvelope<RefreshData> = decode_envelope(&response)?;
        let data = envelope.data.ok_or_else(|| AuthError::Server {
            status: response.status,
            message: "refresh response missing data payload".into(),
        })?;

        tracing::debug!("access token refreshed");
        store::save_token_pair(
            self.store.as_ref(),
            &TokenPair { access_token: data.access_token, refresh_token: pair.refresh_token },
        )
        .await
    }
}

// =============================================================================
// ENVELOPE DECODING
// =============================================================================

fn decode_envelope<T: DeserializeOwned>(response: &HttpResponse) -> Result<ApiEnvelope<T>, AuthError> {
    let status = response.status;

    if (500..600).contains(&status) {
        return Err(AuthError::Server { status, message: envelope_message(&response.body) });
    }
    if (400..500).contains(&status) {
        return Err(AuthError::Authentication(envelope_message(&response.body)));
    }
    if !response.is_success() {
        return Err(AuthError::Server { status, message: envelope_message(&response.body) });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(&response.body)
        .map_err(|e| AuthError::Server { status, message: format!("response parse failed: {e}") })?;

    if !envelope.success {
        return Err(AuthError::Authentication(
            envelope.message.unwrap_or_else(|| "request failed".into()),
        ));
    }
    Ok(envelope)
}

/// Pull the backend's human-readable message out of a failure body, falling
/// back to the raw body or the bare status.
fn envelope_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body) {
        if let Some(message) = envelope.message {
            return message;
        }
    }
    if body.trim().is_empty() {
        "request failed".into()
    } else {
        body.trim().to_string()
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
