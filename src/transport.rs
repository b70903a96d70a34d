//! The HTTP transport seam.
//!
//! The retry engine never talks to `reqwest` directly. It hands a fully built
//! [`HttpRequest`] to a [`Transport`] (blocking) or [`AsyncTransport`] and gets
//! back the status, headers and body bytes. Both traits are implemented for
//! the pooled `reqwest` clients; tests and embedders can supply their own.

use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// A fully built HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded JSON body, for verbs that carry one.
    pub body: Option<Vec<u8>>,
}

/// The parts of an HTTP response the engine needs.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Complete body.
    pub body: Vec<u8>,
}

/// Failures below the HTTP layer.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The attempt exceeded its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was lost.
    #[error("{0}")]
    Connection(String),

    /// The status line arrived but the body could not be read.
    #[error("Failed to read response body: {message}")]
    Body {
        /// Status of the response whose body failed.
        status: StatusCode,
        /// Underlying error.
        message: String,
    },
}

impl TransportError {
    fn from_send(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else {
            TransportError::Connection(error.to_string())
        }
    }

    /// The attempt timeout also bounds the body read, so a stalled body is a
    /// timeout like any other.
    fn from_body(status: StatusCode, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else {
            TransportError::Body {
                status,
                message: error.to_string(),
            }
        }
    }
}

/// Sends one request and blocks until the response body is read.
///
/// Implementations must be safe to share between threads; the engine never
/// serializes access to them.
pub trait Transport: Send + Sync {
    /// Performs exactly one HTTP exchange.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Sends one request without blocking a thread while waiting.
#[async_trait::async_trait]
pub trait AsyncTransport: Send + Sync {
    /// Performs exactly one HTTP exchange.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Builds the pooled async client used when no transport is supplied.
pub(crate) fn async_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

/// Builds the pooled blocking client used when no transport is supplied.
///
/// Must not be called from within an async runtime.
pub(crate) fn blocking_client(timeout: Duration) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

#[async_trait::async_trait]
impl AsyncTransport for reqwest::Client {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(TransportError::from_send)?;
        let status = response.status();
        let headers = response.headers().clone();
        // 204 carries no body to read.
        let body = if status == StatusCode::NO_CONTENT {
            Vec::new()
        } else {
            response
                .bytes()
                .await
                .map_err(|e| TransportError::from_body(status, e))?
                .to_vec()
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for reqwest::blocking::Client {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(TransportError::from_send)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = if status == StatusCode::NO_CONTENT {
            Vec::new()
        } else {
            response
                .bytes()
                .map_err(|e| TransportError::from_body(status, e))?
                .to_vec()
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
