//! HTTP transport abstraction
//!
//! The authentication core never opens sockets itself. Negotiation hands a
//! fully built [`HttpRequest`] to a [`Transport`] and interprets the
//! [`HttpResponse`]. Tests inject [`MockTransport`] instead of a network stack.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request could not be built or sent
    #[error("request failed: {0}")]
    Request(String),

    /// Request timed out
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method, upper case
    pub method: String,
    /// Fully qualified URL including query string
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Optional request body
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request without headers or body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header value (case-insensitive name match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP response as seen by the authentication core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for diagnostics
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for HTTP transport abstraction
///
/// Implementations own connection pooling, TLS and timeouts. Nothing here
/// retries; the caller decides retry policy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the full response
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Real transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Create a transport with the default timeout and user agent
    pub fn new() -> Result<Self, TransportError> {
        Self::with_options(Self::DEFAULT_TIMEOUT, "ibkr-auth/0.1.0", false)
    }

    /// Create a transport with custom options
    ///
    /// `accept_invalid_certs` is meant for the local client portal gateway,
    /// which serves a self-signed certificate.
    pub fn with_options(
        timeout: Duration,
        user_agent: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        debug!(status, len = body.len(), "Received response");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Mock transport for testing
///
/// Returns queued responses in order and records every request it was given.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<HttpResponse, TransportError>>>,
    requests: parking_lot::Mutex<Vec<HttpRequest>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create a mock with no queued responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no mock response queued".into())))
    }
}
