//! # MailBreeze - a resilient client for the MailBreeze email API
//!
//! This crate turns a logical API call (verb, path, query, body, expected
//! response type) into one or more HTTP attempts. It authenticates every
//! request, wraps and unwraps the API's JSON envelope, classifies failures into
//! a typed [`Error`], and retries transient ones with backoff. The same retry
//! policy drives an async [`Client`] and a [`blocking::Client`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailbreeze::{metadata::RequestOptions, Client};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateContact {
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Contact {
//!     id: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .api_key("sk_live_...")
//!         .max_retries(3)
//!         .build()?;
//!
//!     // Reads retry automatically on 429, 5xx and network failures.
//!     let contact = client.get::<Contact>("/api/v1/contact-lists/list_1/contacts/c_1").await?;
//!     println!("Took {:?}", contact.latency);
//!
//!     // Writes can carry an idempotency key that is reused on every retry.
//!     let options = RequestOptions::builder().idempotency_key("signup-42").build();
//!     let created = client
//!         .post_with_options::<_, Contact>(
//!             "/api/v1/contact-lists/list_1/contacts",
//!             &CreateContact { email: "new@example.com".into() },
//!             options,
//!         )
//!         .await?;
//!     if let Some(contact) = created.data {
//!         println!("Created {} <{}>", contact.id, contact.email);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use mailbreeze::{Client, Error};
//!
//! # async fn example(client: Client) {
//! match client.get::<mailbreeze::RawJson>("/api/v1/emails/e1").await {
//!     Ok(response) => println!("{:?}", response.data),
//!     Err(Error::Validation(info)) => eprintln!("fix the request: {}", info),
//!     Err(Error::NotFound(_)) => eprintln!("no such email"),
//!     Err(e) if e.is_retryable() => eprintln!("gave up after retries: {}", e),
//!     Err(e) => eprintln!("failed: {} (request id {:?})", e, e.request_id()),
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! - [`Error::RateLimit`] waits exactly as long as the `Retry-After` header
//!   says, when present.
//! - Otherwise the wait doubles from the base delay: 1s, 2s, 4s, 8s...
//! - At most `max_retries + 1` attempts are made per call.
//! - A [`CancelToken`] set through [`metadata::RequestOptions`] interrupts a
//!   backoff wait and ends the call with an [`codes::INTERRUPTED`] error.
//!
//! ## Logging
//!
//! Attempts, responses and retries are reported through `tracing`. API keys
//! are never logged, and error messages are scrubbed of anything shaped like
//! one.

pub mod blocking;
mod cancel;
mod client;
mod config;
pub mod envelope;
mod error;
pub mod executor;
pub mod headers;
pub mod metadata;
mod response;
pub mod retry;
pub mod transport;

pub use cancel::CancelToken;
pub use client::{CallHandle, Client, ClientBuilder};
pub use config::{ApiKey, ClientConfig, ConfigError, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
pub use envelope::RawJson;
pub use error::{classify, codes, redact, Details, Error, ErrorInfo, Result, REDACTED};
pub use response::Response;
pub use retry::{Attempt, RetryDecision, RetryPolicy};
