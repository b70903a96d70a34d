//! Response wrapper that keeps call metadata next to the decoded data.
//!
//! The [`Response`] type carries the decoded `data` payload along with the
//! envelope's `meta`, the final HTTP status and headers, the request id, and
//! how many attempts and how much time the call took.

use crate::envelope::RawJson;
use crate::executor::Decoded;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful API call.
///
/// `data` is `None` when the server answered 204, sent no `data`, or when the
/// call did not expect a payload (DELETE).
///
/// # Examples
///
/// ```no_run
/// use mailbreeze::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Email {
///     id: String,
///     status: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().api_key("sk_live_...").build()?;
///
/// let response = client.get::<Email>("/emails/email_123").await?;
///
/// if let Some(email) = &response.data {
///     println!("{} is {}", email.id, email.status);
/// }
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded `data` payload.
    pub data: Option<T>,

    /// The envelope's `meta` object, e.g. pagination.
    pub meta: Option<RawJson>,

    /// The HTTP status code of the final attempt.
    pub status: StatusCode,

    /// The response headers of the final attempt.
    pub headers: HeaderMap,

    /// The `X-Request-Id` of the final attempt.
    pub request_id: Option<String>,

    /// Time from the first attempt until the final response, including
    /// backoff waits.
    pub latency: Duration,

    /// The number of attempts made to complete this call.
    ///
    /// This will be `1` for calls that succeeded on the first try.
    pub attempts: u32,
}

impl<T> Response<T> {
    pub(crate) fn from_decoded(decoded: Decoded<T>, latency: Duration, attempts: u32) -> Self {
        Self {
            data: decoded.data,
            meta: decoded.meta,
            status: decoded.status,
            headers: decoded.headers,
            request_id: decoded.request_id,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// ```
    /// # use mailbreeze::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response {
    ///     data: Some(42),
    ///     meta: None,
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     request_id: None,
    ///     latency: Duration::from_millis(100),
    ///     attempts: 1,
    /// };
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data.as_deref(), Some("42"));
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: self.data.map(f),
            meta: self.meta,
            status: self.status,
            headers: self.headers,
            request_id: self.request_id,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Discards the metadata and returns the data.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
