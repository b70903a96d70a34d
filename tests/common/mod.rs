//! Scripted transport shared by the integration tests.
#![allow(dead_code)]

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use mailbreeze::transport::{AsyncTransport, HttpRequest, HttpResponse, Transport, TransportError};
use mailbreeze::{blocking, Client};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const API_KEY: &str = "sk_test_123";

/// One scripted outcome for one HTTP attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Reply {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
    },
    Refuse,
}

pub fn reply(status: u16, body: &'static str) -> Step {
    Step::Reply {
        status,
        headers: Vec::new(),
        body,
    }
}

pub fn reply_with_header(
    status: u16,
    name: &'static str,
    value: &'static str,
    body: &'static str,
) -> Step {
    Step::Reply {
        status,
        headers: vec![(name, value)],
        body,
    }
}

/// Plays back a fixed sequence of responses and records every request.
///
/// Implements both transport traits so the same script can drive the
/// blocking and the async client.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Time elapsed between consecutive attempts.
    pub fn gaps(&self) -> Vec<Duration> {
        let seen = self.seen.lock().unwrap();
        seen.windows(2).map(|pair| pair[1].0 - pair[0].0).collect()
    }

    fn next(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport called more times than scripted");

        match step {
            Step::Refuse => Err(TransportError::Connection(
                "error sending request: connection refused".to_string(),
            )),
            Step::Reply {
                status,
                headers,
                body,
            } => {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.insert(
                        HeaderName::from_static(name),
                        HeaderValue::from_static(value),
                    );
                }
                Ok(HttpResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers: map,
                    body: body.as_bytes().to_vec(),
                })
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.next(request)
    }
}

#[async_trait::async_trait]
impl AsyncTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.next(request)
    }
}

pub fn async_client(transport: Arc<ScriptedTransport>, max_retries: u32) -> Client {
    Client::builder()
        .api_key(API_KEY)
        .base_url("https://api.test")
        .max_retries(max_retries)
        .transport(transport)
        .build()
        .unwrap()
}

pub fn blocking_client(
    transport: Arc<ScriptedTransport>,
    max_retries: u32,
    base_delay: Duration,
) -> blocking::Client {
    blocking::Client::builder()
        .api_key(API_KEY)
        .base_url("https://api.test")
        .max_retries(max_retries)
        .retry_base_delay(base_delay)
        .blocking_transport(transport)
        .build_blocking()
        .unwrap()
}
