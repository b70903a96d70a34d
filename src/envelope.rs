//! The JSON envelope every MailBreeze endpoint wraps its responses in.
//!
//! ```json
//! {"success": true, "data": {...}, "error": null, "meta": {...}}
//! ```
//!
//! Payloads are kept as [`RawJson`] until a caller asks for a concrete type,
//! so the envelope never forces a shape onto `data` or `meta`.

use crate::error::{classify, codes, Details, Error, ErrorInfo, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;

/// An opaque, undecoded JSON value.
///
/// Use it as the response type for endpoints whose shape is not fixed, then
/// call [`RawJson::decode`] once the shape is known.
///
/// ```
/// use mailbreeze::RawJson;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Email { id: String }
///
/// let raw = RawJson::from_string(r#"{"id":"e1","extra":true}"#.to_string()).unwrap();
/// let email: Email = raw.decode().unwrap();
/// assert_eq!(email.id, "e1");
/// ```
#[derive(Clone)]
pub struct RawJson(Box<RawValue>);

impl RawJson {
    /// Wraps a JSON document, validating its syntax.
    pub fn from_string(json: String) -> serde_json::Result<Self> {
        RawValue::from_string(json).map(RawJson)
    }

    /// The JSON text, exactly as received.
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Decodes the value into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.0.get())
    }
}

impl fmt::Debug for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.get())
    }
}

impl fmt::Display for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.get())
    }
}

impl PartialEq for RawJson {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Serialize for RawJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Box::<RawValue>::deserialize(deserializer).map(RawJson)
    }
}

/// Wire-level response body.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Whether the server considers the call successful.
    #[serde(default)]
    pub success: bool,
    /// Response payload.
    #[serde(default)]
    pub data: Option<RawJson>,
    /// Error payload, present on failure.
    #[serde(default)]
    pub error: Option<EnvelopeError>,
    /// Pagination and other side information.
    #[serde(default)]
    pub meta: Option<RawJson>,
}

/// The `error` object of a failed response.
#[derive(Debug, Deserialize)]
pub struct EnvelopeError {
    /// Server-side error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Field-level details.
    #[serde(default)]
    pub details: Option<Details>,
}

impl Envelope {
    /// Returns `true` when the server reported a failure, either through
    /// `success: false` or a non-null `error` object.
    pub fn is_failure(&self) -> bool {
        !self.success || self.error.is_some()
    }
}

/// What the caller expects to find in `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Decode `data` into the caller's type.
    Body,
    /// Ignore `data` entirely, as for DELETE.
    Nothing,
}

/// Response-level facts used when an error has to be built.
#[derive(Debug, Clone, Default)]
pub struct ResponseContext {
    /// HTTP status code.
    pub status: u16,
    /// `X-Request-Id` header.
    pub request_id: Option<String>,
    /// `Retry-After` header in seconds.
    pub retry_after: Option<u64>,
}

impl ResponseContext {
    pub(crate) fn classify(&self, message: &str, details: Option<Details>) -> Error {
        classify(
            self.status,
            message,
            self.request_id.clone(),
            self.retry_after,
            details,
        )
    }
}

/// Serializes a request payload to UTF-8 JSON.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| {
        Error::Serialization(ErrorInfo::new(
            0,
            codes::SERIALIZATION_ERROR,
            format!("Failed to serialize request body: {}", e),
        ))
    })
}

/// Parses a response body into an [`Envelope`].
///
/// A body that is not an envelope becomes a classified error when the status
/// is 400 or above, and a `PARSE_ERROR` otherwise.
pub fn decode(body: &[u8], context: &ResponseContext) -> Result<Envelope> {
    serde_json::from_slice::<Envelope>(body).map_err(|e| {
        if context.status >= 400 {
            context.classify(&format!("HTTP error: {}", context.status), None)
        } else {
            Error::Unknown(
                ErrorInfo::new(
                    context.status,
                    codes::PARSE_ERROR,
                    format!("Failed to parse response: {}", e),
                )
                .with_request_id(context.request_id.clone()),
            )
        }
    })
}

/// Extracts the typed `data` payload from an envelope.
///
/// Returns `Ok(None)` when the caller expects nothing or when `data` is
/// absent or `null`.
pub fn extract_data<T: DeserializeOwned>(
    envelope: &Envelope,
    expect: Expect,
    context: &ResponseContext,
) -> Result<Option<T>> {
    if expect == Expect::Nothing {
        return Ok(None);
    }
    let Some(data) = &envelope.data else {
        return Ok(None);
    };

    data.decode().map(Some).map_err(|e| {
        Error::Serialization(
            ErrorInfo::new(
                context.status,
                codes::PARSE_ERROR,
                format!("Failed to parse response data: {}", e),
            )
            .with_request_id(context.request_id.clone()),
        )
    })
}
