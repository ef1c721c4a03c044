use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};

use crate::config::{ClientConfig, API_KEY_HEADER};
use crate::error::{Result, TransportError};

/// Raw response body chunks in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

/// One HTTP call: method, endpoint path, query, extra headers, and optional JSON body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append a header, overriding a session default of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Bound the whole exchange, body included.
    ///
    /// Leave unset for unbounded streaming bodies.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A response whose status and headers have arrived; the body is still unread.
#[derive(Debug)]
pub struct HttpResponse {
    url: String,
    inner: reqwest::Response,
}

impl HttpResponse {
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The raw `Content-Type` header, if present and valid ASCII.
    pub fn content_type(&self) -> Option<&str> {
        self.inner
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read the full body.
    pub async fn bytes(self) -> Result<Bytes> {
        let url = self.url;
        self.inner
            .bytes()
            .await
            .map_err(|err| TransportError::from_reqwest(&url, err))
    }

    /// Read the full body as text (lossy on invalid UTF-8).
    pub async fn text(self) -> Result<String> {
        let url = self.url;
        self.inner
            .text()
            .await
            .map_err(|err| TransportError::from_reqwest(&url, err))
    }

    /// Turn the body into a chunk stream. Dropping the stream closes the connection.
    pub fn into_byte_stream(self) -> ByteStream {
        let url = self.url;
        Box::pin(
            self.inner
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|err| TransportError::from_reqwest(&url, err))),
        )
    }
}

/// Per-client HTTP connection context.
///
/// Owns the lazily-created connection pool and composes the default headers. Idle
/// connections are never kept: every call opens a fresh TCP connection.
pub struct HttpSession {
    config: ClientConfig,
    base_url: Url,
    client: Mutex<Option<reqwest::Client>>,
}

impl HttpSession {
    /// Validate `config` and create a session. No connection is opened yet.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|err| {
            TransportError::InvalidUrl {
                url: config.base_url.clone(),
                reason: err.to_string(),
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl {
                url: config.base_url.clone(),
                reason: "not a base url".to_string(),
            });
        }

        Ok(Self {
            config,
            base_url,
            client: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|err| TransportError::InvalidUrl {
            url: joined,
            reason: err.to_string(),
        })
    }

    /// Default headers merged with the request's own.
    pub fn compose_headers(&self, extra: &[(String, String)]) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.config.api_key {
            let mut value = header_value(API_KEY_HEADER, key)?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static("x-api-key"), value);
        }
        for (name, value) in extra {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            headers.insert(header_name, header_value(name, value)?);
        }
        Ok(headers)
    }

    /// Build the wire request without sending it.
    pub fn build(&self, request: &Request) -> Result<reqwest::Request> {
        let url = self.url(&request.path)?;
        let url_text = display_url(&url);
        let mut builder = self
            .client()?
            .request(request.method.clone(), url)
            .headers(self.compose_headers(&request.headers)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| TransportError::from_reqwest(&url_text, err))
    }

    /// Send a request and return once the status line and headers have arrived.
    ///
    /// Non-2xx statuses are not errors at this layer; callers map them.
    pub async fn send(&self, request: &Request) -> Result<HttpResponse> {
        let wire = self.build(request)?;
        let url = display_url(wire.url());
        tracing::debug!(method = %request.method, url = %url, "sending request");

        let inner = self
            .client()?
            .execute(wire)
            .await
            .map_err(|err| TransportError::from_reqwest(&url, err))?;
        tracing::debug!(url = %url, status = inner.status().as_u16(), "response headers received");

        Ok(HttpResponse { url, inner })
    }

    /// Whether the connection pool currently exists.
    pub fn is_open(&self) -> bool {
        self.lock_client().is_some()
    }

    /// Tear down the connection pool. The next call recreates it.
    pub fn close(&self) {
        if self.lock_client().take().is_some() {
            tracing::debug!(base_url = %self.base_url, "http session closed");
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        let mut slot = self.lock_client();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(TransportError::Client)?;
        tracing::debug!(base_url = %self.base_url, "http session opened");
        *slot = Some(client.clone());
        Ok(client)
    }

    fn lock_client(&self) -> std::sync::MutexGuard<'_, Option<reqwest::Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("base_url", &self.base_url.as_str())
            .field("open", &self.is_open())
            .finish()
    }
}

// Query strings are left out of logs and errors.
fn display_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| TransportError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })
}
