//! HTTP transport and error taxonomy for the cvtxt controller client.
//!
//! This is the lowest layer of cvtxt. It provides:
//! - [`HttpSession`], one per client: lazy connection pool, no keep-alive,
//!   `X-API-KEY` header composition, and a single `send` primitive
//! - [`ApiError`], the one mapping from HTTP status to typed failure
//! - [`TransportError`] for connection-level failures
//!
//! Everything else builds on the [`HttpResponse`] and [`ByteStream`] types provided here.

pub mod config;
pub mod error;
pub mod session;

pub use config::{ClientConfig, API_KEY_HEADER, DEFAULT_BASE_URL};
pub use error::{ApiError, ApiErrorKind, Result, TransportError};
pub use session::{ByteStream, HttpResponse, HttpSession, Request};

pub use reqwest::Method;
