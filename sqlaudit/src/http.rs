//! HTTP transport abstraction shared by every client.
//!
//! This module defines the `Transport` trait so the datasource, review and user clients never talk
//! to `reqwest` directly. The production implementation resolves paths against the configured base
//! URL, attaches the bearer token and applies the request timeout; the mock implementation replays
//! canned responses and records every call.
//!
//! No retries happen here or anywhere else in the crate: every operation is one request and one
//! response.

use crate::config::Config;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Characters escaped inside a single path segment (RFC 3986 path set plus `/`, `%` and `:`).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode a caller-supplied value (database or table name) for use as one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// A single backend call, with the path relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body. Serialization failures surface as `InvalidInput`, before any I/O.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| Error::invalid_input(format!("Failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// `"{METHOD} {path}"`, the key the mock transport matches on.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// A response whose body is the given JSON value.
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing backend requests.
///
/// Implementations own base-URL resolution, auth headers and timeouts. Clients hold an
/// `Arc<dyn Transport>` so one transport can be shared by every client in a process.
///
/// # Errors
/// Returns `Error::Transport` when the request could not be completed (connection refused,
/// timeout, DNS failure). Non-2xx statuses are *not* errors at this level; they are returned as
/// an `HttpResponse` and classified by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production transport using reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
    request_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, access_token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Transport(anyhow::Error::new(e).context("Failed to create HTTP client")))?;

        Ok(Self {
            client,
            base_url: ensure_slash(&base_url),
            access_token,
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url.clone(), config.access_token.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` replaces the last path segment unless it ends with '/', so joining
/// `http://host/api` with `review/ddl` would otherwise give `http://host/review/ddl`.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute(&self, request: &ApiRequest) -> Result<HttpResponse> {
        let url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_input(format!("Invalid request path '{}': {}", request.path, e)))?;

        tracing::debug!(url = %url, timeout_ms = self.request_timeout.as_millis() as u64, "Executing HTTP request");

        let mut req = self.client.request(request.method.clone(), url.clone()).timeout(self.request_timeout);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "HTTP request failed");
            Error::Transport(anyhow::Error::new(e).context(format!("{} {} failed", request.method, url)))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(anyhow::Error::new(e).context("Failed to read response body")))?;

        tracing::debug!(status = status, response_len = body.len(), "HTTP request completed");

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mock transport for testing.
///
/// Responses are queued per `"{METHOD} {path}"` key and returned in FIFO order. Every call is
/// recorded, including calls for which no response was configured.
///
/// # Example
/// ```
/// use sqlaudit::http::{HttpResponse, MockTransport};
/// use serde_json::json;
///
/// let mock = MockTransport::new();
/// mock.add_response(
///     "POST review/common/ddl",
///     Ok(HttpResponse::json(200, json!({"code": 200, "message": "ok", "data": {"score": 90}}))),
/// );
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<HttpResponse>>>>>,
    calls: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a `"{METHOD} {path}"` key.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses.lock().entry(key.to_string()).or_default().push_back(response);
    }

    /// Shorthand for a successful `{code: 200, message, data}` envelope.
    pub fn add_ok(&self, key: &str, data: Value) {
        self.add_response(
            key,
            Ok(HttpResponse::json(
                200,
                serde_json::json!({ "code": 200, "message": "success", "data": data }),
            )),
        );
    }

    /// Get all calls that have been made to this mock transport.
    pub fn get_calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    /// The most recent call, if any.
    pub fn last_call(&self) -> Option<ApiRequest> {
        self.calls.lock().last().cloned()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<HttpResponse> {
        self.calls.lock().push(request.clone());

        let key = request.key();
        if let Some(response) = self.responses.lock().get_mut(&key).and_then(VecDeque::pop_front) {
            return response;
        }

        Err(Error::Transport(anyhow::anyhow!("No mock response configured for {key}")))
    }
}
