//! Request metadata and per-call options.

use crate::cancel::CancelToken;
use crate::envelope::Expect;
use http::Method;

/// Options for an individual request.
///
/// The idempotency key is sanitized when the options are built: carriage
/// returns and line feeds are removed so the value can never inject a header.
///
/// ```
/// use mailbreeze::metadata::RequestOptions;
///
/// let options = RequestOptions::builder()
///     .idempotency_key("key\r\nEvil-Header: x")
///     .build();
///
/// assert_eq!(options.idempotency_key(), Some("keyEvil-Header: x"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    idempotency_key: Option<String>,
    cancel_token: Option<CancelToken>,
}

impl RequestOptions {
    /// Creates a builder for request options.
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    /// The sanitized idempotency key, if one was set.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Token that interrupts the call's backoff waits, if one was set.
    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel_token.as_ref()
    }
}

/// Builder for [`RequestOptions`].
#[derive(Debug, Default)]
pub struct RequestOptionsBuilder {
    idempotency_key: Option<String>,
    cancel_token: Option<CancelToken>,
}

impl RequestOptionsBuilder {
    /// Sets the `X-Idempotency-Key` sent with the request.
    ///
    /// The same key is sent on every retry of the call, so the server can
    /// deduplicate writes.
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets a token that can interrupt the call while it waits to retry.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Builds the options, sanitizing the idempotency key.
    pub fn build(self) -> RequestOptions {
        RequestOptions {
            idempotency_key: self.idempotency_key.map(|key| sanitize_header_value(&key)),
            cancel_token: self.cancel_token,
        }
    }
}

/// Removes CR and LF characters from an untrusted header value.
pub fn sanitize_header_value(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Metadata for an individual HTTP request.
///
/// Contains everything except the body: method, path relative to the base
/// URL, query parameters, per-call options, and whether a response payload is
/// expected.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the base URL (e.g. `/emails/e1`).
    pub path: String,

    /// Query parameters, in insertion order.
    pub query_params: Vec<(String, String)>,

    /// Per-call options.
    pub options: RequestOptions,

    /// Whether the response `data` should be decoded.
    pub expect: Expect,
}

impl RequestMetadata {
    /// Creates metadata for the given method and path.
    ///
    /// DELETE requests expect no payload; every other method decodes `data`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let expect = if method == Method::DELETE {
            Expect::Nothing
        } else {
            Expect::Body
        };

        Self {
            method,
            path: path.into(),
            query_params: Vec::new(),
            options: RequestOptions::default(),
            expect,
        }
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets per-call options.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Ignores any response payload.
    pub fn expect_no_content(mut self) -> Self {
        self.expect = Expect::Nothing;
        self
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_sanitized() {
        let options = RequestOptions::builder()
            .idempotency_key("key\r\nEvil-Header: x")
            .build();

        let key = options.idempotency_key().unwrap();
        assert!(!key.contains('\r'));
        assert!(!key.contains('\n'));
        assert_eq!(key, "keyEvil-Header: x");
    }

    #[test]
    fn test_clean_key_untouched() {
        let options = RequestOptions::builder().idempotency_key("order-42").build();
        assert_eq!(options.idempotency_key(), Some("order-42"));
    }

    #[test]
    fn test_no_key_by_default() {
        let options = RequestOptions::builder().build();
        assert!(options.idempotency_key().is_none());
        assert!(options.cancel_token().is_none());
    }

    #[test]
    fn test_delete_expects_nothing() {
        assert_eq!(RequestMetadata::new(Method::DELETE, "/x").expect, Expect::Nothing);
        assert_eq!(RequestMetadata::new(Method::GET, "/x").expect, Expect::Body);
        assert_eq!(
            RequestMetadata::new(Method::POST, "/x").expect_no_content().expect,
            Expect::Nothing
        );
    }

    #[test]
    fn test_query_params_keep_order() {
        let metadata = RequestMetadata::new(Method::GET, "/emails")
            .with_query_param("page", "2")
            .with_query_params([("limit", "50"), ("status", "sent")]);

        let keys: Vec<&str> = metadata.query_params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["page", "limit", "status"]);
    }
}
