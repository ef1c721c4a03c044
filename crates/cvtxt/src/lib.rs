//! Streaming client for networked hardware controllers.
//!
//! cvtxt turns the controller's long-lived HTTP responses into typed, cancellable event
//! sequences: line-delimited text streams (controller, camera, and counter messages) and
//! the camera's `multipart/x-mixed-replace` MJPEG stream, demultiplexed frame by frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: HTTP session, configuration, and error taxonomy
//! - [`frame`]: Line and multipart stream codecs
//! - [`client`]: Stream sessions, REST API, and models (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use cvtxt_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cvtxt_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use cvtxt_client::*;
}
