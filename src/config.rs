//! Client configuration shared by every call.

use crate::retry::RetryPolicy;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mailbreeze.com";

/// Timeout applied to each HTTP attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Errors raised while building a client.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No API key, or a blank one, was provided.
    #[error("API key is required and cannot be blank")]
    MissingApiKey,

    /// The API key cannot be sent as an HTTP header value.
    #[error("API key contains characters that are not valid in a header")]
    InvalidApiKey,

    /// The base URL is not an absolute URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be created.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A MailBreeze API key.
///
/// The key is never printed: `Debug` shows `[REDACTED]`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key, rejecting blank input.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if http::HeaderValue::from_str(&key).is_err() {
            return Err(ConfigError::InvalidApiKey);
        }
        Ok(Self(key))
    }

    /// The raw key, for building the auth header.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::error::REDACTED)
    }
}

/// Immutable configuration created once per client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Credentials sent with every request.
    pub api_key: ApiKey,
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Connect and request timeout for each attempt.
    pub timeout: Duration,
    /// Retry behavior, including the retry budget.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Maximum retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }
}

/// Strips trailing slashes and checks that the result is an absolute URL.
pub fn normalize_base_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Url::parse(trimmed)?;
    Ok(trimmed.to_string())
}
