//! Error taxonomy for API and session operations.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures, HTTP status failures and envelope (`code != 0`)
//! failures stay distinct so the session layer can tell a revoked token
//! (401) apart from an ordinary rejected request. Nothing here is retried.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use crate::storage::StorageError;

pub const NETWORK_UNAVAILABLE_MESSAGE: &str = "network unavailable, check your connection";
pub const SESSION_EXPIRED_MESSAGE: &str = "session expired, please log in again";
pub const RATE_LIMITED_MESSAGE: &str = "too many requests, try again later";
pub const REQUEST_FAILED_MESSAGE: &str = "request failed";
pub const NOT_LOGGED_IN_MESSAGE: &str = "not logged in";

/// Errors produced by API calls and session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, reset).
    #[error("network unavailable: {0}")]
    Network(String),

    /// The server answered HTTP 401; the session has been cleared.
    #[error("unauthorized: {}", .message.as_deref().unwrap_or(SESSION_EXPIRED_MESSAGE))]
    Unauthorized { message: Option<String> },

    /// The server answered HTTP 429.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("http status {status}: {}", .message.as_deref().unwrap_or(REQUEST_FAILED_MESSAGE))]
    Http { status: u16, message: Option<String> },

    /// The envelope carried a non-zero `code`.
    #[error("request rejected (code {code}): {message}")]
    Domain { code: i64, message: String },

    /// A successful envelope lacked a required payload field.
    #[error("response missing {0}")]
    MissingData(&'static str),

    /// The operation needs a session token and none is held.
    #[error("not authenticated")]
    Unauthenticated,

    /// The response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Durable session storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Text suitable for showing to the person using the storefront.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => NETWORK_UNAVAILABLE_MESSAGE.to_string(),
            Self::Unauthorized { message } => message.clone().unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            Self::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
            Self::Http { message, .. } => message.clone().unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string()),
            Self::Domain { message, .. } => message.clone(),
            Self::Unauthenticated => NOT_LOGGED_IN_MESSAGE.to_string(),
            Self::MissingData(_) | Self::Decode(_) | Self::HttpClientBuild(_) | Self::Storage(_) => self.to_string(),
        }
    }

    /// Whether this failure invalidates the held session by itself.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
