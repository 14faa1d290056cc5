//! Outbound HTTP for the storefront API.
//!
//! ARCHITECTURE
//! ============
//! `Transport` is the raw wire seam: it sends one request and hands back the
//! status and body, or fails with `ApiError::Network` when no response was
//! received. `ApiClient` layers the session on top: it injects the bearer
//! token from the `SessionStore`, maps HTTP status codes to the error
//! taxonomy, and clears the session on 401 before reporting it.
//!
//! Redirecting to the login page after a 401 is not done here; the session
//! manager owns navigation and the refresh task and reacts to
//! `ApiError::Unauthorized`.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Timeouts;
use crate::error::ApiError;
use crate::store::SessionStore;
use crate::types::{Envelope, message_from_value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// One outbound API call, path relative to the API base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

/// Status and body of a received response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends requests over the wire.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` when no response was received.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

// =============================================================================
// REQWEST TRANSPORT
// =============================================================================

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport with fixed per-request and connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(RawResponse { status, body })
    }
}

// =============================================================================
// API CLIENT
// =============================================================================

/// Session-aware API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: SessionStore,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, store: SessionStore) -> Self {
        Self { transport, store }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Send a request and decode the response envelope.
    ///
    /// The envelope is returned as-is; a non-zero `code` is not an error at
    /// this layer.
    ///
    /// # Errors
    ///
    /// Returns the mapped error for transport failures and non-2xx statuses,
    /// or `ApiError::Decode` for an unreadable body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Envelope<T>, ApiError> {
        let request = ApiRequest { method, path: path.to_string(), body, bearer: self.store.token() };
        debug!(method = method.as_str(), path, "api request");

        let response = self.transport.send(request).await?;
        if (200..300).contains(&response.status) {
            return serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()));
        }
        Err(self.status_error(path, &response))
    }

    fn status_error(&self, path: &str, response: &RawResponse) -> ApiError {
        let message = body_message(&response.body);
        match response.status {
            401 => {
                warn!(path, "api answered 401; clearing session");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to erase persisted session");
                }
                ApiError::Unauthorized { message }
            }
            429 => ApiError::RateLimited,
            status => ApiError::Http { status, message },
        }
    }
}

/// Pull `message` out of an error body, if it is JSON and has one.
fn body_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value {
        serde_json::Value::Object(mut map) => map.remove("message").and_then(message_from_value),
        _ => None,
    }
}

/// Turn an envelope into its payload, mapping `code != 0` to `ApiError::Domain`.
///
/// # Errors
///
/// Returns `ApiError::Domain` carrying the server message, or `fallback`
/// when the server sent none.
pub fn into_data<T>(envelope: Envelope<T>, fallback: &str) -> Result<Option<T>, ApiError> {
    if envelope.is_success() {
        Ok(envelope.data)
    } else {
        Err(ApiError::Domain {
            code: envelope.code,
            message: envelope.message.unwrap_or_else(|| fallback.to_string()),
        })
    }
}
