//! Incremental decoding of streamed controller response bodies.
//!
//! Two codecs share one contract ([`StreamCodec`]): bytes arrive in arbitrarily sized
//! chunks, and complete events come out in wire order regardless of how the body was cut.
//!
//! - [`LineCodec`] turns a `\n`-delimited text body into [`TextEvent`]s
//! - [`MultipartCodec`] demultiplexes `multipart/x-mixed-replace` into [`FrameEvent`]s
//!
//! [`ChunkReader`] drives either codec over a [`cvtxt_transport::ByteStream`].

pub mod codec;
pub mod error;
pub mod line;
pub mod multipart;
pub mod reader;

pub use codec::StreamCodec;
pub use error::{FrameError, Result};
pub use line::{LineCodec, LineConfig, TextEvent, DEFAULT_MAX_LINE_LENGTH};
pub use multipart::{
    Boundary, FrameEvent, MultipartCodec, MultipartConfig, DEFAULT_MAX_HEADER_SIZE,
    DEFAULT_MAX_PART_SIZE, DEFAULT_MEDIA_TYPE,
};
pub use reader::ChunkReader;
