//! Single-attempt request execution.
//!
//! The executor turns [`RequestMetadata`] and an encoded body into one HTTP
//! exchange and one typed outcome. It never loops: retries belong to the
//! clients in [`crate::client`] and [`crate::blocking`].

use crate::config::ClientConfig;
use crate::envelope::{self, RawJson, ResponseContext};
use crate::error::{codes, Error, ErrorInfo, Result};
use crate::headers::build_headers;
use crate::metadata::RequestMetadata;
use crate::transport::{AsyncTransport, HttpRequest, HttpResponse, Transport, TransportError};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Response header carrying the server-assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Response header carrying the rate limit wait in seconds.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// The decoded outcome of one successful attempt.
#[derive(Debug)]
pub struct Decoded<T> {
    /// Extracted `data`, or `None` for 204, absent data or ignored data.
    pub data: Option<T>,
    /// The envelope's `meta`, if any.
    pub meta: Option<RawJson>,
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// `X-Request-Id` header.
    pub request_id: Option<String>,
}

/// Performs single HTTP attempts against the configured API.
#[derive(Debug, Clone)]
pub struct Executor {
    config: Arc<ClientConfig>,
}

impl Executor {
    /// Creates an executor for the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    /// The configuration requests are built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the HTTP request for `metadata`.
    ///
    /// The URL is the base URL followed by the path, with query parameters
    /// appended in order.
    pub fn prepare(&self, metadata: &RequestMetadata, body: Option<Vec<u8>>) -> Result<HttpRequest> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, metadata.path)).map_err(|e| {
            Error::Unknown(ErrorInfo::new(
                0,
                codes::INVALID_URL,
                format!("Invalid request URL for path {}: {}", metadata.path, e),
            ))
        })?;

        if !metadata.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &metadata.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(HttpRequest {
            method: metadata.method.clone(),
            url,
            headers: build_headers(&self.config, &metadata.options),
            body,
        })
    }

    /// Performs one blocking attempt.
    pub fn execute_blocking<T: DeserializeOwned>(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
        metadata: &RequestMetadata,
        attempt: u32,
    ) -> Result<Decoded<T>> {
        log_attempt(request, attempt);
        let response = transport.send(request).map_err(transport_error)?;
        handle_response(response, metadata, attempt)
    }

    /// Performs one attempt without blocking a thread.
    pub async fn execute_async<T: DeserializeOwned>(
        &self,
        transport: &dyn AsyncTransport,
        request: &HttpRequest,
        metadata: &RequestMetadata,
        attempt: u32,
    ) -> Result<Decoded<T>> {
        log_attempt(request, attempt);
        let response = transport.send(request).await.map_err(transport_error)?;
        handle_response(response, metadata, attempt)
    }
}

fn log_attempt(request: &HttpRequest, attempt: u32) {
    tracing::debug!(
        method = %request.method,
        url = %request.url,
        attempt = attempt,
        "Executing HTTP request"
    );
}

fn transport_error(error: TransportError) -> Error {
    match error {
        TransportError::Body { status, message } => Error::Unknown(ErrorInfo::new(
            status.as_u16(),
            codes::RESPONSE_READ_ERROR,
            format!("Failed to read response body: {}", message),
        )),
        other => Error::network(other.to_string()),
    }
}

/// Parses `Retry-After` as whole seconds. Anything else counts as absent.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn response_context(response: &HttpResponse) -> ResponseContext {
    ResponseContext {
        status: response.status.as_u16(),
        request_id: response
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        retry_after: parse_retry_after(&response.headers),
    }
}

/// Turns a raw HTTP response into decoded data or a classified error.
pub(crate) fn handle_response<T: DeserializeOwned>(
    response: HttpResponse,
    metadata: &RequestMetadata,
    attempt: u32,
) -> Result<Decoded<T>> {
    let context = response_context(&response);

    tracing::info!(
        status = context.status,
        attempt = attempt,
        request_id = context.request_id.as_deref().unwrap_or(""),
        "Received HTTP response"
    );

    if response.status == StatusCode::NO_CONTENT {
        return Ok(Decoded {
            data: None,
            meta: None,
            status: response.status,
            headers: response.headers,
            request_id: context.request_id,
        });
    }

    let envelope = envelope::decode(&response.body, &context)?;

    if envelope.is_failure() {
        let (message, details) = match envelope.error {
            Some(error) => (
                error.message.unwrap_or_else(|| "Unknown error".to_string()),
                error.details,
            ),
            None => ("Unknown error".to_string(), None),
        };
        return Err(context.classify(&message, details));
    }

    if context.status >= 400 {
        return Err(context.classify("HTTP error", None));
    }

    let data = envelope::extract_data(&envelope, metadata.expect, &context)?;

    Ok(Decoded {
        data,
        meta: envelope.meta,
        status: response.status,
        headers: response.headers,
        request_id: context.request_id,
    })
}
