//! Error types for MailBreeze API calls.
//!
//! Every failure on the call path is reported as one of the [`Error`] variants.
//! Each variant carries an [`ErrorInfo`] with the HTTP status code (0 when the
//! request never produced a response), a machine-readable code, a human
//! message, and the request id echoed by the server when one was sent.
//!
//! Messages are redacted on construction: anything shaped like a MailBreeze
//! API key is replaced by [`REDACTED`], so neither `Display` nor `Debug` can
//! leak a key that the server (or a transport error) echoed back.

use crate::envelope::RawJson;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Marker substituted for API-key-shaped substrings in error messages.
pub const REDACTED: &str = "[REDACTED]";

/// Machine codes attached to errors produced by this crate.
pub mod codes {
    /// HTTP 400.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// HTTP 401.
    pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";
    /// HTTP 403, classified as unknown.
    pub const FORBIDDEN: &str = "FORBIDDEN";
    /// HTTP 404.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// HTTP 429.
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    /// HTTP 5xx.
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    /// Any other status.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    /// The request never produced a response.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    /// The request body could not be encoded.
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    /// The response body or its `data` could not be decoded.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    /// The response headers arrived but the body could not be read.
    pub const RESPONSE_READ_ERROR: &str = "RESPONSE_READ_ERROR";
    /// Base URL and path did not form a valid URL.
    pub const INVALID_URL: &str = "INVALID_URL";
    /// The call was cancelled while waiting to retry.
    pub const INTERRUPTED: &str = "INTERRUPTED";
}

/// Structured field-level details attached to an error, keyed by field name.
pub type Details = BTreeMap<String, RawJson>;

/// Context shared by every [`Error`] variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    status_code: u16,
    code: String,
    message: String,
    request_id: Option<String>,
    details: Details,
}

impl ErrorInfo {
    /// Creates error context. The message is redacted before it is stored.
    pub fn new(status_code: u16, code: impl Into<String>, message: impl AsRef<str>) -> Self {
        Self {
            status_code,
            code: code.into(),
            message: redact(message.as_ref()).into_owned(),
            request_id: None,
            details: Details::new(),
        }
    }

    /// Attaches the server-assigned request id.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Attaches field-level details.
    pub fn with_details(mut self, details: Option<Details>) -> Self {
        self.details = details.unwrap_or_default();
        self
    }

    /// HTTP status code, or 0 for failures below the HTTP layer.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Redacted human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Value of the `X-Request-Id` response header, when present.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Field-level details. Empty when the server sent none.
    pub fn details(&self) -> &Details {
        &self.details
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (status {}, code {}",
            self.message, self.status_code, self.code
        )?;
        if let Some(request_id) = &self.request_id {
            write!(f, ", request id {}", request_id)?;
        }
        f.write_str(")")
    }
}

/// The error type for MailBreeze API calls.
///
/// The variant tells a caller what to do next:
///
/// - [`Error::Validation`], [`Error::Authentication`], [`Error::NotFound`]:
///   fix the request. Never retried.
/// - [`Error::RateLimit`], [`Error::Server`]: try again later. Retried
///   automatically up to the configured budget.
/// - [`Error::Network`]: the service could not be reached. Retried
///   automatically up to the configured budget.
/// - [`Error::Serialization`], [`Error::Unknown`]: not retried.
///
/// # Examples
///
/// ```
/// use mailbreeze::{classify, Error};
///
/// let err = classify(429, "slow down", Some("req_1".into()), Some(30), None);
/// assert!(err.is_retryable());
/// assert_eq!(err.retry_after(), Some(30));
///
/// match err {
///     Error::RateLimit { info, .. } => assert_eq!(info.request_id(), Some("req_1")),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The API key was missing, invalid or revoked (HTTP 401).
    #[error("Authentication failed: {0}")]
    Authentication(ErrorInfo),

    /// The request was rejected as invalid (HTTP 400).
    ///
    /// Field-level problems are available through [`ErrorInfo::details`].
    #[error("Validation failed: {0}")]
    Validation(ErrorInfo),

    /// The addressed resource does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(ErrorInfo),

    /// Too many requests (HTTP 429).
    #[error("Rate limit exceeded: {info}")]
    RateLimit {
        /// Error context.
        info: ErrorInfo,
        /// Seconds to wait, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// The server failed to handle the request (HTTP 5xx).
    #[error("Server error: {0}")]
    Server(ErrorInfo),

    /// The request never produced a response: connection refused, DNS
    /// failure, or timeout.
    #[error("Network error: {0}")]
    Network(ErrorInfo),

    /// A request body could not be encoded, or response data did not match
    /// the expected shape.
    #[error("Serialization error: {0}")]
    Serialization(ErrorInfo),

    /// Anything else, including cancellation ([`codes::INTERRUPTED`]).
    #[error("Unknown error: {0}")]
    Unknown(ErrorInfo),
}

impl Error {
    /// Returns the context shared by all variants.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            Error::Authentication(info)
            | Error::Validation(info)
            | Error::NotFound(info)
            | Error::RateLimit { info, .. }
            | Error::Server(info)
            | Error::Network(info)
            | Error::Serialization(info)
            | Error::Unknown(info) => info,
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Fixed per variant: rate limits, server errors and network failures are
    /// retryable, everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit { .. } | Error::Server(_) | Error::Network(_)
        )
    }

    /// HTTP status code, or 0 for failures below the HTTP layer.
    pub fn status_code(&self) -> u16 {
        self.info().status_code()
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        self.info().code()
    }

    /// Redacted human-readable message.
    pub fn message(&self) -> &str {
        self.info().message()
    }

    /// Request id echoed by the server, when known.
    pub fn request_id(&self) -> Option<&str> {
        self.info().request_id()
    }

    /// Field-level details.
    pub fn details(&self) -> &Details {
        self.info().details()
    }

    /// Seconds the server asked us to wait, for rate limit errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns `true` if the call was cancelled while waiting to retry.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Unknown(info) if info.code() == codes::INTERRUPTED)
    }

    pub(crate) fn network(message: impl AsRef<str>) -> Self {
        Error::Network(ErrorInfo::new(0, codes::NETWORK_ERROR, message))
    }

    pub(crate) fn interrupted() -> Self {
        Error::Unknown(ErrorInfo::new(0, codes::INTERRUPTED, "Request interrupted"))
    }
}

/// Maps an HTTP status and server-provided context to an [`Error`].
///
/// | status | variant |
/// |--------|---------|
/// | 400 | [`Error::Validation`] |
/// | 401 | [`Error::Authentication`] |
/// | 403 | [`Error::Unknown`] with code `FORBIDDEN` |
/// | 404 | [`Error::NotFound`] |
/// | 429 | [`Error::RateLimit`] |
/// | 500..  | [`Error::Server`] |
/// | other | [`Error::Unknown`] |
pub fn classify(
    status_code: u16,
    message: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
    details: Option<Details>,
) -> Error {
    let info = |code: &str| {
        ErrorInfo::new(status_code, code, message)
            .with_request_id(request_id.clone())
            .with_details(details.clone())
    };

    match status_code {
        400 => Error::Validation(info(codes::VALIDATION_ERROR)),
        401 => Error::Authentication(info(codes::AUTHENTICATION_ERROR)),
        404 => Error::NotFound(info(codes::NOT_FOUND)),
        429 => Error::RateLimit {
            info: info(codes::RATE_LIMIT_EXCEEDED),
            retry_after,
        },
        403 => Error::Unknown(info(codes::FORBIDDEN)),
        500.. => Error::Server(info(codes::SERVER_ERROR)),
        _ => Error::Unknown(info(codes::UNKNOWN_ERROR)),
    }
}

fn api_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"sk_(live|test)_[a-zA-Z0-9]+").ok())
        .as_ref()
}

/// Replaces every API-key-shaped substring with [`REDACTED`].
///
/// If the key pattern is unavailable the whole message is withheld.
///
/// ```
/// assert_eq!(
///     mailbreeze::redact("bad key sk_live_AbC123"),
///     "bad key [REDACTED]"
/// );
/// ```
pub fn redact(message: &str) -> Cow<'_, str> {
    match api_key_pattern() {
        Some(pattern) => pattern.replace_all(message, REDACTED),
        None => Cow::Borrowed(REDACTED),
    }
}

/// A specialized `Result` type for MailBreeze API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        let cases: [(u16, &str, bool); 9] = [
            (400, codes::VALIDATION_ERROR, false),
            (401, codes::AUTHENTICATION_ERROR, false),
            (403, codes::FORBIDDEN, false),
            (404, codes::NOT_FOUND, false),
            (409, codes::UNKNOWN_ERROR, false),
            (429, codes::RATE_LIMIT_EXCEEDED, true),
            (500, codes::SERVER_ERROR, true),
            (503, codes::SERVER_ERROR, true),
            (599, codes::SERVER_ERROR, true),
        ];

        for (status, code, retryable) in cases {
            let err = classify(status, "boom", None, None, None);
            assert_eq!(err.status_code(), status);
            assert_eq!(err.code(), code, "status {status}");
            assert_eq!(err.is_retryable(), retryable, "status {status}");
        }
    }

    #[test]
    fn test_classify_variants() {
        assert!(matches!(classify(400, "", None, None, None), Error::Validation(_)));
        assert!(matches!(classify(401, "", None, None, None), Error::Authentication(_)));
        assert!(matches!(classify(404, "", None, None, None), Error::NotFound(_)));
        assert!(matches!(
            classify(429, "", None, Some(7), None),
            Error::RateLimit { retry_after: Some(7), .. }
        ));
        assert!(matches!(classify(502, "", None, None, None), Error::Server(_)));
        assert!(matches!(classify(418, "", None, None, None), Error::Unknown(_)));
    }

    #[test]
    fn test_classify_keeps_request_id_and_details() {
        let mut details = Details::new();
        details.insert("email".to_string(), RawJson::from_string("\"invalid\"".to_string()).unwrap());

        let err = classify(400, "bad", Some("req_9".to_string()), None, Some(details));

        assert_eq!(err.request_id(), Some("req_9"));
        assert_eq!(err.details()["email"].as_str(), "\"invalid\"");
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_message_redacted_everywhere() {
        let err = classify(401, "Invalid key sk_live_AbCdEf123", None, None, None);

        assert!(err.message().contains(REDACTED));
        assert!(!err.message().contains("sk_live_AbCdEf123"));
        assert!(!err.to_string().contains("sk_live_AbCdEf123"));
        assert!(err.to_string().contains(REDACTED));
        assert!(!format!("{err:?}").contains("sk_live_AbCdEf123"));
    }

    #[test]
    fn test_key_pattern_available() {
        assert!(api_key_pattern().is_some());
        assert_eq!(redact("sk_live_abc"), REDACTED);
    }

    #[test]
    fn test_redact_leaves_other_text() {
        assert_eq!(redact("nothing secret"), "nothing secret");
        assert_eq!(redact("sk_test_x1 and sk_live_Y2"), "[REDACTED] and [REDACTED]");
        assert_eq!(redact("sk_prod_abc"), "sk_prod_abc");
    }

    #[test]
    fn test_network_and_interrupted() {
        let err = Error::network("connection refused");
        assert_eq!(err.status_code(), 0);
        assert_eq!(err.code(), codes::NETWORK_ERROR);
        assert!(err.is_retryable());
        assert!(!err.is_interrupted());

        let err = Error::interrupted();
        assert_eq!(err.code(), codes::INTERRUPTED);
        assert!(err.is_interrupted());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_includes_request_id() {
        let err = classify(500, "oops", Some("req_1".to_string()), None, None);
        assert_eq!(
            err.to_string(),
            "Server error: oops (status 500, code SERVER_ERROR, request id req_1)"
        );
    }
}
