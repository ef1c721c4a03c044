use std::fmt;
use std::time::Duration;

/// Header (and query parameter) carrying the controller API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Default base URL of a controller reachable on the local machine.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Connection configuration for one controller client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL all endpoint paths are appended to, e.g. `http://192.168.7.2/api/v1`.
    pub base_url: String,
    /// Static API key sent as `X-API-KEY`.
    /// Treated as credential material and redacted in debug output.
    pub api_key: Option<String>,
    /// Timeout for establishing each TCP connection.
    pub connect_timeout: Duration,
    /// Total timeout for plain REST calls. Streaming requests never carry one.
    pub request_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("cvtxt/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Configuration for `base_url` with default timeouts and no API key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the API key. Empty keys are treated as absent.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("ClientConfig");
        dbg.field("base_url", &self.base_url);
        if let Some(key) = &self.api_key {
            dbg.field("api_key", &format_args!("<redacted:{} bytes>", key.len()));
        } else {
            dbg.field("api_key", &Option::<String>::None);
        }
        dbg.field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
