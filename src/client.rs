//! Async MailBreeze client with retry logic and typed errors.
//!
//! The [`Client`] type is the main entry point for making API calls. Use
//! [`ClientBuilder`] to configure it; the same builder also produces the
//! [`blocking::Client`](crate::blocking::Client).

use crate::{
    blocking,
    config::{normalize_base_url, ApiKey, ClientConfig, ConfigError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
    envelope,
    executor::Executor,
    metadata::{RequestMetadata, RequestOptions},
    retry::{Attempt, RetryDecision, RetryPolicy},
    transport::{self, AsyncTransport, HttpRequest, Transport},
    Error, Response, Result,
};
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;

/// An async client for the MailBreeze API.
///
/// The client is cheap to clone and designed to be reused: clones share one
/// configuration and one connection pool.
///
/// Each call runs on its own tokio task and returns a [`CallHandle`]. Await
/// the handle to get the outcome. Dropping it detaches the call: an attempt
/// already on the wire is not aborted.
///
/// # Examples
///
/// ```no_run
/// use mailbreeze::{Client, RawJson};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct SendEmail<'a> {
///     from: &'a str,
///     to: Vec<&'a str>,
///     subject: &'a str,
///     html: &'a str,
/// }
///
/// #[derive(Deserialize)]
/// struct SendResult {
///     message_id: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().api_key("sk_live_...").build()?;
///
/// let email = SendEmail {
///     from: "hello@example.com",
///     to: vec!["user@example.com"],
///     subject: "Welcome",
///     html: "<p>Hi!</p>",
/// };
/// let sent = client.post::<_, SendResult>("/api/v1/emails", &email).await?;
/// if let Some(result) = sent.data {
///     println!("Queued {}", result.message_id);
/// }
///
/// // Untyped pass-through for endpoints without a fixed shape.
/// let stats = client.get::<RawJson>("/api/v1/emails/stats").await?;
/// println!("{:?}", stats.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    executor: Executor,
    transport: Arc<dyn AsyncTransport>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration shared by every call.
    pub fn config(&self) -> &ClientConfig {
        self.inner.executor.config()
    }

    /// Makes an API call.
    ///
    /// The body, if any, is encoded immediately; an encoding failure resolves
    /// the handle with [`Error::Serialization`] without touching the network.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn call<Req, Res>(&self, metadata: RequestMetadata, body: Option<&Req>) -> CallHandle<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Send + 'static,
    {
        let request = body
            .map(|body| envelope::encode(body))
            .transpose()
            .and_then(|body| self.inner.executor.prepare(&metadata, body));

        match request {
            Ok(request) => {
                let inner = Arc::clone(&self.inner);
                CallHandle::spawn(async move { inner.run(metadata, request).await })
            }
            Err(error) => CallHandle::failed(error),
        }
    }

    /// Makes a GET request.
    pub fn get<Res>(&self, path: impl Into<String>) -> CallHandle<Res>
    where
        Res: DeserializeOwned + Send + 'static,
    {
        self.call::<(), Res>(RequestMetadata::new(Method::GET, path), None)
    }

    /// Makes a GET request with query parameters.
    pub fn get_with_query<Res, K, V>(
        &self,
        path: impl Into<String>,
        query: impl IntoIterator<Item = (K, V)>,
    ) -> CallHandle<Res>
    where
        Res: DeserializeOwned + Send + 'static,
        K: Into<String>,
        V: Into<String>,
    {
        let metadata = RequestMetadata::new(Method::GET, path).with_query_params(query);
        self.call::<(), Res>(metadata, None)
    }

    /// Makes a POST request with a JSON body.
    pub fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> CallHandle<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Send + 'static,
    {
        self.call(RequestMetadata::new(Method::POST, path), Some(body))
    }

    /// Makes a POST request with a JSON body and per-call options, such as an
    /// idempotency key.
    pub fn post_with_options<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
        options: RequestOptions,
    ) -> CallHandle<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Send + 'static,
    {
        let metadata = RequestMetadata::new(Method::POST, path).with_options(options);
        self.call(metadata, Some(body))
    }

    /// Makes a PATCH request with a JSON body.
    pub fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> CallHandle<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Send + 'static,
    {
        self.call(RequestMetadata::new(Method::PATCH, path), Some(body))
    }

    /// Makes a PUT request with a JSON body.
    pub fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> CallHandle<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Send + 'static,
    {
        self.call(RequestMetadata::new(Method::PUT, path), Some(body))
    }

    /// Makes a DELETE request. Any response payload is ignored.
    pub fn delete(&self, path: impl Into<String>) -> CallHandle<()> {
        self.call::<(), ()>(RequestMetadata::new(Method::DELETE, path), None)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", self.config())
            .finish()
    }
}

impl ClientInner {
    async fn run<T>(&self, metadata: RequestMetadata, request: HttpRequest) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let start_time = tokio::time::Instant::now();
        let policy = &self.executor.config().retry;
        let mut attempt = Attempt::first();

        loop {
            let result = self
                .executor
                .execute_async::<T>(self.transport.as_ref(), &request, &metadata, attempt.number())
                .await;

            let error = match result {
                Ok(decoded) => {
                    return Ok(Response::from_decoded(
                        decoded,
                        start_time.elapsed(),
                        attempt.number(),
                    ))
                }
                Err(error) => error,
            };

            let delay = match next_step(policy, &error, &attempt, &metadata) {
                Some(delay) => delay,
                None => return Err(error),
            };

            let interrupted = match metadata.options.cancel_token() {
                Some(token) => token.sleep_or_cancelled(delay).await,
                None => {
                    tokio::time::sleep(delay).await;
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

/// Logs a failed attempt and asks the policy whether to retry.
///
/// Shared by the async and blocking clients so both follow one policy.
pub(crate) fn next_step(
    policy: &RetryPolicy,
    error: &Error,
    attempt: &Attempt,
    metadata: &RequestMetadata,
) -> Option<Duration> {
    tracing::warn!(
        error = %error,
        attempt = attempt.number(),
        method = %metadata.method,
        path = %metadata.path,
        "Request failed"
    );

    match policy.decide(error, attempt) {
        RetryDecision::Retry(delay) => {
            if let Some(retry_after) = error.retry_after() {
                tracing::info!(
                    retry_after_secs = retry_after,
                    attempt = attempt.number(),
                    "Rate limited - waiting before retry"
                );
            } else {
                tracing::info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = attempt.number(),
                    "Retrying request after delay"
                );
            }
            Some(delay)
        }
        RetryDecision::GiveUp => None,
    }
}

/// The pending outcome of an async API call.
///
/// Resolves exactly once, with the decoded [`Response`] or the final
/// [`Error`].
#[must_use = "dropping a CallHandle detaches the call; await it to observe the outcome"]
pub struct CallHandle<T> {
    state: CallState<T>,
}

enum CallState<T> {
    Failed(Option<Error>),
    Running(JoinHandle<Result<Response<T>>>),
}

impl<T: Send + 'static> CallHandle<T> {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<Response<T>>> + Send + 'static,
    {
        Self {
            state: CallState::Running(tokio::spawn(future)),
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            state: CallState::Failed(Some(error)),
        }
    }
}

impl<T> Future for CallHandle<T> {
    type Output = Result<Response<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            CallState::Failed(error) => match error.take() {
                Some(error) => Poll::Ready(Err(error)),
                None => panic!("CallHandle polled after completion"),
            },
            CallState::Running(handle) => match ready!(Pin::new(handle).poll(cx)) {
                Ok(result) => Poll::Ready(result),
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Err(_) => Poll::Ready(Err(Error::interrupted())),
            },
        }
    }
}

impl<T> std::fmt::Debug for CallHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            CallState::Failed(_) => "failed",
            CallState::Running(handle) if handle.is_finished() => "finished",
            CallState::Running(_) => "running",
        };
        f.debug_struct("CallHandle").field("state", &state).finish()
    }
}

/// Builder for configuring and creating a [`Client`] or a
/// [`blocking::Client`].
///
/// # Examples
///
/// ```no_run
/// use mailbreeze::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), mailbreeze::ConfigError> {
/// let client = ClientBuilder::new()
///     .api_key("sk_live_...")
///     .base_url("https://api.mailbreeze.com")
///     .timeout(Duration::from_secs(10))
///     .max_retries(5)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: Option<Arc<dyn AsyncTransport>>,
    blocking_transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            transport: None,
            blocking_transport: None,
        }
    }

    /// Sets the API key. Required.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL for all requests. Trailing slashes are removed.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the connect and request timeout for each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a retryable failure is retried.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry. Later retries double it.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    /// Enables random jitter on exponential backoff delays.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.retry.jitter = jitter;
        self
    }

    /// Replaces the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Uses a custom transport for the async client.
    pub fn transport(mut self, transport: Arc<dyn AsyncTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a custom transport for the blocking client.
    pub fn blocking_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.blocking_transport = Some(transport);
        self
    }

    fn config(&self) -> std::result::Result<ClientConfig, ConfigError> {
        let api_key = ApiKey::new(self.api_key.clone().unwrap_or_default())?;
        Ok(ClientConfig {
            api_key,
            base_url: normalize_base_url(&self.base_url)?,
            timeout: self.timeout,
            retry: self.retry.clone(),
        })
    }

    /// Builds the async [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or blank, the base URL is
    /// invalid, or the HTTP client cannot be created.
    pub fn build(self) -> std::result::Result<Client, ConfigError> {
        let config = self.config()?;
        let transport: Arc<dyn AsyncTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(transport::async_client(config.timeout)?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                executor: Executor::new(Arc::new(config)),
                transport,
            }),
        })
    }

    /// Builds the [`blocking::Client`].
    ///
    /// Without a custom transport this creates a `reqwest` blocking client,
    /// which must not happen inside an async runtime.
    ///
    /// # Errors
    ///
    /// Same as [`ClientBuilder::build`].
    pub fn build_blocking(self) -> std::result::Result<blocking::Client, ConfigError> {
        let config = self.config()?;
        let transport: Arc<dyn Transport> = match self.blocking_transport {
            Some(transport) => transport,
            None => Arc::new(transport::blocking_client(config.timeout)?),
        };

        Ok(blocking::Client::new(Executor::new(Arc::new(config)), transport))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
