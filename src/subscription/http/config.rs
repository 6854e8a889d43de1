use std::env;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

/// Base URL used when `API_BASE_URL` is not set.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Environment variable overriding [`ApiConfig::base_url`].
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

/// Error type for configuration loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Configuration for query behavior.
///
/// This controls when cached data is considered stale.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long data is considered fresh after a successful fetch.
    ///
    /// A subscriber attaching to fresh data gets it from the cache without a fetch.
    /// Once stale, subscribing starts a new fetch.
    pub stale_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0), // immediately stale
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale time.
    #[must_use]
    pub const fn new(stale_time: Duration) -> Self {
        Self { stale_time }
    }
}

/// Location of the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Origin and path prefix for every endpoint, e.g. `http://localhost:8080/api`.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// Creates a configuration pointing at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if `base_url` is not an absolute URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { base_url })
    }

    /// Loads the configuration from the process environment.
    ///
    /// Uses `API_BASE_URL` when set and non-empty, otherwise the default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the override is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_override(env::var(API_BASE_URL_ENV).ok())
    }

    fn from_override(value: Option<String>) -> Result<Self, ConfigError> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(url) => Self::new(url.trim()),
            None => Ok(Self::default()),
        }
    }

    /// Joins `path` onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
