//! Request header assembly.

use crate::config::ClientConfig;
use crate::metadata::RequestOptions;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Header carrying the API key.
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Header carrying the caller's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("x-idempotency-key");

/// Client identifier sent as the `User-Agent`.
pub const CLIENT_IDENTIFIER: &str = concat!("mailbreeze-rust/", env!("CARGO_PKG_VERSION"));

/// Builds the headers for one request.
///
/// Always sets `Content-Type`, the API key and the client identifier. The
/// idempotency header is added only when the options carry a key.
pub fn build_headers(config: &ClientConfig, options: &RequestOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_IDENTIFIER));

    // ApiKey::new already checked the key is a valid header value.
    if let Ok(mut value) = HeaderValue::from_str(config.api_key.expose()) {
        value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, value);
    }

    if let Some(key) = options.idempotency_key() {
        match HeaderValue::from_str(key) {
            Ok(value) => {
                headers.insert(IDEMPOTENCY_KEY_HEADER, value);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping idempotency key that is not a valid header value");
            }
        }
    }

    headers
}
