use std::fmt;

/// Errors that can occur at the HTTP connection level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured base URL or a request path did not form a valid URL.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A configured header value cannot be sent over HTTP.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// Failed to establish a connection (DNS, refused, reset during connect).
    #[error("failed to connect to {url}: {source}")]
    Connect { url: String, source: reqwest::Error },

    /// The request did not complete within its configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Any other failure while sending a request or reading a response body.
    #[error("http error on {url}: {source}")]
    Http { url: String, source: reqwest::Error },
}

impl TransportError {
    /// Classify a `reqwest` failure for the given request URL.
    ///
    /// The URL embedded in `err` is dropped; it may carry the API key as a query parameter.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        let err = err.without_url();
        if err.is_timeout() {
            TransportError::Timeout { url }
        } else if err.is_connect() {
            TransportError::Connect { url, source: err }
        } else if err.is_builder() {
            TransportError::InvalidUrl {
                reason: err.to_string(),
                url,
            }
        } else {
            TransportError::Http { url, source: err }
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 400
    BadRequest,
    /// 404
    NotFound,
    /// 412
    PreconditionFailed,
    /// 500
    InternalServer,
    /// Any other non-2xx status.
    Unexpected,
    /// A 2xx status whose body could not be parsed.
    MalformedResponse,
}

impl ApiErrorKind {
    /// Map a non-success HTTP status to its kind.
    ///
    /// Returns `None` for 2xx statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            412 => Some(Self::PreconditionFailed),
            500 => Some(Self::InternalServer),
            _ => Some(Self::Unexpected),
        }
    }

    /// Short human-readable label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::NotFound => "not found",
            Self::PreconditionFailed => "precondition failed",
            Self::InternalServer => "internal server error",
            Self::Unexpected => "unexpected status",
            Self::MalformedResponse => "malformed response",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed API failure: status-derived kind, status code, and raw body.
///
/// Constructed once from a response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}{}", status_suffix(.status), body_suffix(.body))]
pub struct ApiError {
    kind: ApiErrorKind,
    status: Option<u16>,
    body: String,
}

impl ApiError {
    /// Map an HTTP status and body to a typed error.
    ///
    /// Returns `None` when `status` is 2xx; every other status yields exactly one error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Option<Self> {
        ApiErrorKind::from_status(status).map(|kind| Self {
            kind,
            status: Some(status),
            body: body.into(),
        })
    }

    /// A successful status whose body could not be interpreted.
    pub fn malformed(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::MalformedResponse,
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Raw response body as received from the controller.
    pub fn body(&self) -> &str {
        &self.body
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|status| format!(" (HTTP {status})")).unwrap_or_default()
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
