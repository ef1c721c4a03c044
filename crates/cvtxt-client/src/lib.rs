//! Controller client: stream sessions and REST API.
//!
//! This is the "just works" layer. Create a [`ControllerApi`], then either call REST
//! methods or open a stream and consume its events:
//!
//! ```no_run
//! # async fn demo() -> cvtxt_client::Result<()> {
//! use cvtxt_client::{ClientConfig, ControllerApi, StreamEvent};
//!
//! let api = ControllerApi::new(ClientConfig::new("http://192.168.7.2/api/v1"))?;
//! let mut stream = api.controller_message_stream(None).await?;
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         StreamEvent::Data(line) => println!("{line}"),
//!         StreamEvent::Closed => break,
//!         StreamEvent::Error(err) => return Err(err),
//!     }
//! }
//! stream.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod session;

pub use api::{ControllerApi, CAMERA_IMAGE_STREAM, CAMERA_MESSAGE_STREAM, CONTROLLER_MESSAGE_STREAM};
pub use error::{ClientError, Result};
pub use session::{
    CancelHandle, FrameStream, LineStream, SessionConfig, SessionStatus, StreamEvent,
    StreamRequest, StreamSession, DEFAULT_EVENT_BUFFER, DEFAULT_STOP_TIMEOUT,
};

pub use cvtxt_frame::{FrameEvent, LineConfig, MultipartConfig, TextEvent};
pub use cvtxt_transport::{ApiError, ApiErrorKind, ClientConfig};
