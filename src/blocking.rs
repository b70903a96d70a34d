//! A blocking MailBreeze client.
//!
//! Same calls, same retry policy and same errors as the async
//! [`Client`](crate::Client), but every method runs on the calling thread and
//! returns once the call has succeeded or given up. During backoff the thread
//! sleeps on a condition variable; it does not spin.
//!
//! Do not use this client from inside an async runtime.
//!
//! ```no_run
//! use mailbreeze::blocking;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Email {
//!     id: String,
//! }
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = blocking::Client::builder()
//!     .api_key("sk_live_...")
//!     .build_blocking()?;
//!
//! let email = client.get::<Email>("/api/v1/emails/email_123")?;
//! println!("{:?}", email.data.map(|e| e.id));
//! # Ok(())
//! # }
//! ```

use crate::{
    client::{next_step, ClientBuilder},
    config::ClientConfig,
    envelope,
    executor::Executor,
    metadata::{RequestMetadata, RequestOptions},
    retry::Attempt,
    transport::{HttpRequest, Transport},
    Error, Response, Result,
};
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A blocking client for the MailBreeze API.
///
/// Cheap to clone; clones share configuration and the connection pool, and
/// may be used from many threads at once.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    executor: Executor,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub(crate) fn new(executor: Executor, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                executor,
                transport,
            }),
        }
    }

    /// Creates a new `ClientBuilder`. Finish it with
    /// [`ClientBuilder::build_blocking`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration shared by every call.
    pub fn config(&self) -> &ClientConfig {
        self.inner.executor.config()
    }

    /// Makes an API call, retrying transient failures.
    pub fn call<Req, Res>(&self, metadata: RequestMetadata, body: Option<&Req>) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let body = body.map(|body| envelope::encode(body)).transpose()?;
        let request = self.inner.executor.prepare(&metadata, body)?;
        self.inner.run(&metadata, &request)
    }

    /// Makes a GET request.
    pub fn get<Res: DeserializeOwned>(&self, path: impl Into<String>) -> Result<Response<Res>> {
        self.call::<(), Res>(RequestMetadata::new(Method::GET, path), None)
    }

    /// Makes a GET request with query parameters.
    pub fn get_with_query<Res, K, V>(
        &self,
        path: impl Into<String>,
        query: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
        K: Into<String>,
        V: Into<String>,
    {
        let metadata = RequestMetadata::new(Method::GET, path).with_query_params(query);
        self.call::<(), Res>(metadata, None)
    }

    /// Makes a POST request with a JSON body.
    pub fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(RequestMetadata::new(Method::POST, path), Some(body))
    }

    /// Makes a POST request with a JSON body and per-call options.
    pub fn post_with_options<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::POST, path).with_options(options);
        self.call(metadata, Some(body))
    }

    /// Makes a PATCH request with a JSON body.
    pub fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(RequestMetadata::new(Method::PATCH, path), Some(body))
    }

    /// Makes a PUT request with a JSON body.
    pub fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(RequestMetadata::new(Method::PUT, path), Some(body))
    }

    /// Makes a DELETE request. Any response payload is ignored.
    pub fn delete(&self, path: impl Into<String>) -> Result<Response<()>> {
        self.call::<(), ()>(RequestMetadata::new(Method::DELETE, path), None)
    }
}

impl ClientInner {
    fn run<T: DeserializeOwned>(
        &self,
        metadata: &RequestMetadata,
        request: &HttpRequest,
    ) -> Result<Response<T>> {
        let start_time = Instant::now();
        let policy = &self.executor.config().retry;
        let mut attempt = Attempt::first();

        loop {
            let error = match self.executor.execute_blocking::<T>(
                self.transport.as_ref(),
                request,
                metadata,
                attempt.number(),
            ) {
                Ok(decoded) => {
                    return Ok(Response::from_decoded(
                        decoded,
                        start_time.elapsed(),
                        attempt.number(),
                    ))
                }
                Err(error) => error,
            };

            let Some(delay) = next_step(policy, &error, &attempt, metadata) else {
                return Err(error);
            };

            let interrupted = match metadata.options.cancel_token() {
                Some(token) => token.wait_timeout(delay),
                None => {
                    std::thread::sleep(delay);
                    false
                }
            };
            if interrupted {
                tracing::warn!(
                    attempt = attempt.number(),
                    path = %metadata.path,
                    "Retry wait interrupted"
                );
                return Err(Error::interrupted());
            }

            attempt = attempt.retry(error);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::Client")
            .field("config", self.config())
            .finish()
    }
}
