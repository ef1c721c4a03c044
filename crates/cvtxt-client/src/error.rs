use std::time::Duration;

use cvtxt_frame::FrameError;
use cvtxt_transport::{ApiError, TransportError};

use crate::session::SessionStatus;

/// Errors that can occur in client and stream session operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection-level failure (DNS, refused, reset, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The controller answered with a failing status or an unparsable body.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The response body violated the stream format.
    #[error("protocol error: {0}")]
    Protocol(FrameError),

    /// A lifecycle operation was called in a state that does not allow it.
    #[error("cannot {operation} a session that is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// A bounded wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A request body could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// True if retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => ClientError::Transport(err),
            other => ClientError::Protocol(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_transport_errors_stay_transport_errors() {
        let err: ClientError = FrameError::Transport(TransportError::Timeout {
            url: "http://ctrl/x".to_string(),
        })
        .into();
        assert!(matches!(err, ClientError::Transport(TransportError::Timeout { .. })));
        assert!(err.is_transient());

        let err: ClientError = FrameError::MissingContentType.into();
        assert!(matches!(err, ClientError::Protocol(FrameError::MissingContentType)));
        assert!(!err.is_transient());
    }

    #[test]
    fn invalid_state_message_names_status() {
        let err = ClientError::InvalidState {
            operation: "start",
            status: SessionStatus::Running,
        };
        assert_eq!(err.to_string(), "cannot start a session that is running");
    }
}
