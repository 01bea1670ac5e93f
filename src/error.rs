//! Error taxonomy for the client SDK.
//!
//! DESIGN
//! ======
//! Four caller-visible kinds map directly to how the UI reacts:
//! validation errors never touch the network, authentication errors are
//! surfaced verbatim, network errors are retried only inside the gateway's
//! 401-refresh path, and server errors carry the backend status.

/// Errors produced by auth, gateway, and storage operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Pre-flight client-side validation failure. Never reaches the network.
    #[error("{0}")]
    Validation(String),

    /// The backend rejected the request (4xx) — bad credentials or an
    /// expired/invalid token.
    #[error("{0}")]
    Authentication(String),

    /// The backend was unreachable — no response at all.
    #[error("network error: {0}")]
    Network(String),

    /// The backend returned a 5xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A secure-store write or delete failed. Reads never produce this —
    /// they degrade to absence.
    #[error("storage error: {0}")]
    Storage(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl AuthError {
    /// `true` for backend rejections (bad credentials, dead token).
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// `true` when the backend never responded.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// `true` for failures detected before any network call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
