use cvtxt_transport::TransportError;

/// Errors that can occur while decoding a streamed response body.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A multipart response carried no `Content-Type` header.
    #[error("multipart stream has no Content-Type header")]
    MissingContentType,

    /// The `Content-Type` header has no usable `boundary` parameter.
    #[error("no boundary in Content-Type {0:?}")]
    MissingBoundary(String),

    /// A text line is not valid UTF-8.
    #[error("invalid UTF-8 in text stream: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A text line grew beyond the configured maximum without a line break.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// A part header block could not be parsed.
    #[error("malformed part headers: {0}")]
    MalformedHeaders(String),

    /// A part header block grew beyond the configured maximum without a terminator.
    #[error("part headers too large ({size} bytes, max {max})")]
    HeadersTooLarge { size: usize, max: usize },

    /// A part payload grew beyond the configured maximum without an end marker.
    #[error("part too large ({size} bytes, max {max})")]
    PartTooLarge { size: usize, max: usize },

    /// The body could not be read from the connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error surfaced through a codec.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed; no further events will arrive.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed-stream conditions (as opposed to transport failures or a clean close).
    pub fn is_protocol(&self) -> bool {
        !matches!(
            self,
            FrameError::Transport(_) | FrameError::Io(_) | FrameError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
