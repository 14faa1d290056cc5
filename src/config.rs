//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_REFRESH_SECS: u64 = 10 * 60;
pub const DEFAULT_SESSION_FILE: &str = ".storefront-session.json";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session refresh period must be greater than zero")]
    ZeroRefreshPeriod,
    #[error("api base url must not be empty")]
    EmptyBaseUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeouts: Timeouts,
    pub refresh_period: Duration,
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeouts: Timeouts::default(),
            refresh_period: Duration::from_secs(DEFAULT_SESSION_REFRESH_SECS),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `STOREFRONT_API_BASE_URL`: default `http://127.0.0.1:8000/api`
    /// - `STOREFRONT_REQUEST_TIMEOUT_SECS`: default 15
    /// - `STOREFRONT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `STOREFRONT_SESSION_REFRESH_SECS`: default 600
    /// - `STOREFRONT_SESSION_FILE`: default `.storefront-session.json`
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is blank or the refresh period is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("STOREFRONT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let timeouts = Timeouts {
            request_secs: env_parse("STOREFRONT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("STOREFRONT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let refresh_secs = env_parse("STOREFRONT_SESSION_REFRESH_SECS", DEFAULT_SESSION_REFRESH_SECS);
        let session_file = std::env::var("STOREFRONT_SESSION_FILE")
            .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);

        Self::new(api_base_url, timeouts, Duration::from_secs(refresh_secs), session_file)
    }

    /// Validate and normalize an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is blank or the refresh period is zero.
    pub fn new(
        api_base_url: String,
        timeouts: Timeouts,
        refresh_period: Duration,
        session_file: PathBuf,
    ) -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(&api_base_url);
        if api_base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if refresh_period.is_zero() {
            return Err(ConfigError::ZeroRefreshPeriod);
        }
        Ok(Self { api_base_url, timeouts, refresh_period, session_file })
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
