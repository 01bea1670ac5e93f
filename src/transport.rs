//! HTTP transport seam.
//!
//! DESIGN
//! ======
//! The gateway talks to the network through the [`HttpTransport`] trait so
//! tests can script responses and count calls without a live server. The
//! real implementation wraps `reqwest` with request/connect timeouts.
//! Transport errors mean "no response at all" and map to
//! [`AuthError::Network`]; any response, whatever its status, is returned
//! to the gateway for envelope handling.

use std::time::Duration;

use crate::config::HttpTimeouts;
use crate::error::AuthError;

/// HTTP method subset used by the CELF API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// An outgoing request as the gateway sees it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Bearer credential attached when a stored access token exists.
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// A raw response: status plus unparsed body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the gateway and the network.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Network`] when no response was received.
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, AuthError>;
}

// =============================================================================
// REQWEST IMPLEMENTATION
// =============================================================================

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build the underlying HTTP client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientBuild`] if the client cannot be constructed.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::ClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, AuthError> {
        tracing::debug!(method = req.method.as_str(), url = %req.url, "http request");
        let mut builder = match req.method {
            Method::Get => self.http.get(&req.url),
            Method::Post => self.http.post(&req.url),
            Method::Patch => self.http.patch(&req.url),
        };
        if let Some(token) = &req.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: pops one response per call and records every
    /// request so tests can assert call counts, URLs, and bearers.
    pub struct MockTransport {
        responses: Mutex<Vec<Result<HttpResponse, AuthError>>>,
        calls: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        #[must_use]
        pub fn new(responses: Vec<Result<HttpResponse, AuthError>>) -> Self {
            Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
        }

        #[must_use]
        pub fn ok(status: u16, body: &str) -> Result<HttpResponse, AuthError> {
            Ok(HttpResponse { status, body: body.to_string() })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<HttpRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, req: HttpRequest) -> Result<HttpResponse, AuthError> {
            self.calls.lock().unwrap().push(req);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(AuthError::Network("mock transport exhausted".into()))
            } else {
                responses.remove(0)
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
