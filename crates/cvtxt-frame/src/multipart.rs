//! `multipart/x-mixed-replace` demultiplexing.
//!
//! A camera stream is an unbounded sequence of parts with no length prefix:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <payload>\r\n
//! --frame\r\n
//! ...
//! ```
//!
//! Markers, header blocks and payloads may be split across any number of network
//! chunks. The codec keeps one growing buffer and only emits a part once its start
//! marker, its full header block and the next marker have all been seen.

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::{find, StreamCodec};
use crate::error::{FrameError, Result};

/// Default media type accepted as a frame.
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Default maximum size of one part header block: 8 KiB.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

/// Default maximum size of one part payload: 16 MiB.
pub const DEFAULT_MAX_PART_SIZE: usize = 16 * 1024 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CLOSE_SUFFIX: &[u8] = b"--";

/// One complete image payload.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameEvent {
    /// Content type declared by the part.
    pub content_type: String,
    /// Raw encoded image bytes.
    pub payload: Bytes,
}

impl FrameEvent {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEvent")
            .field("content_type", &self.content_type)
            .field("payload", &format_args!("<{} bytes>", self.payload.len()))
            .finish()
    }
}

/// Part delimiter token announced in the response `Content-Type` header.
///
/// Fixed for the lifetime of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    token: String,
    marker: Bytes,
}

impl Boundary {
    /// Create a boundary from its bare token (without the leading `--`).
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() || token.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(FrameError::MissingBoundary(token));
        }
        let marker = Bytes::from(format!("--{token}"));
        Ok(Self { token, marker })
    }

    /// Extract the boundary from a `Content-Type` header value.
    ///
    /// ```
    /// use cvtxt_frame::Boundary;
    ///
    /// let boundary =
    ///     Boundary::from_content_type(Some("multipart/x-mixed-replace; boundary=\"frame\"")).unwrap();
    /// assert_eq!(boundary.token(), "frame");
    /// assert_eq!(boundary.marker(), b"--frame");
    /// ```
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self> {
        let value = content_type.ok_or(FrameError::MissingContentType)?;

        let token = value
            .split(';')
            .skip(1)
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
            .map(|(_, token)| token.trim().trim_matches('"'))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| FrameError::MissingBoundary(value.to_string()))?;

        Self::new(token).map_err(|_| FrameError::MissingBoundary(value.to_string()))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The delimiter as it appears on the wire: `--<token>`.
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }
}

/// Configuration for the multipart codec.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Media type a part must declare to be emitted. Default: `image/jpeg`.
    pub media_type: String,
    /// Maximum bytes in one part header block. Default: 8 KiB.
    pub max_header_size: usize,
    /// Maximum bytes in one part payload. Default: 16 MiB.
    pub max_part_size: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_part_size: DEFAULT_MAX_PART_SIZE,
        }
    }
}

#[derive(Debug)]
enum State {
    /// Looking for the first marker; everything before it is discarded.
    Preamble,
    /// Just past a marker; waiting for the header block (or the closing `--`).
    Headers,
    /// Inside a payload; waiting for the next marker.
    Body { content_type: Option<String> },
    /// Closing delimiter seen; remaining bytes are ignored.
    Epilogue,
}

/// Demultiplexes a `multipart/x-mixed-replace` body into [`FrameEvent`]s.
#[derive(Debug)]
pub struct MultipartCodec {
    boundary: Boundary,
    config: MultipartConfig,
    state: State,
    // Bytes before this index have already been searched for the current delimiter.
    scan_from: usize,
    discarded: u64,
}

impl MultipartCodec {
    pub fn new(boundary: Boundary, config: MultipartConfig) -> Self {
        Self {
            boundary,
            config,
            state: State::Preamble,
            scan_from: 0,
            discarded: 0,
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Number of complete parts dropped so far (wrong type or empty payload).
    pub fn discarded_parts(&self) -> u64 {
        self.discarded
    }

    fn accepts(&self, content_type: Option<&str>) -> bool {
        content_type
            .and_then(|value| value.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(&self.config.media_type))
    }

    fn rescan_tail(&mut self, len: usize, needle_len: usize) {
        self.scan_from = len.saturating_sub(needle_len.saturating_sub(1));
    }
}

impl Decoder for MultipartCodec {
    type Item = FrameEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        let marker_len = self.boundary.marker().len();

        loop {
            match &mut self.state {
                State::Preamble => match find(src, self.boundary.marker(), self.scan_from) {
                    Some(idx) => {
                        src.advance(idx + marker_len);
                        self.scan_from = 0;
                        self.state = State::Headers;
                    }
                    None => {
                        let keep = marker_len - 1;
                        if src.len() > keep {
                            src.advance(src.len() - keep);
                        }
                        self.scan_from = 0;
                        return Ok(None);
                    }
                },

                State::Headers => {
                    if src.len() < CLOSE_SUFFIX.len() {
                        return Ok(None);
                    }
                    if src.starts_with(CLOSE_SUFFIX) {
                        tracing::debug!(boundary = self.boundary.token(), "closing boundary received");
                        self.state = State::Epilogue;
                        continue;
                    }

                    let terminator = find(src, HEADER_TERMINATOR, self.scan_from);
                    let next_marker = find(src, self.boundary.marker(), self.scan_from);

                    // The next part started before this one finished its header block.
                    if let Some(next) =
                        next_marker.filter(|next| terminator.map_or(true, |idx| *next < idx))
                    {
                        src.advance(next + marker_len);
                        self.scan_from = 0;
                        self.discarded += 1;
                        tracing::trace!("discarding part without header block");
                        continue;
                    }

                    let Some(idx) = terminator else {
                        if src.len() > self.config.max_header_size {
                            return Err(FrameError::HeadersTooLarge {
                                size: src.len(),
                                max: self.config.max_header_size,
                            });
                        }
                        self.rescan_tail(src.len(), marker_len.max(HEADER_TERMINATOR.len()));
                        return Ok(None);
                    };

                    let block = src.split_to(idx + HEADER_TERMINATOR.len());
                    self.scan_from = 0;
                    let headers = parse_headers(&block[..idx])?;
                    let content_type = headers
                        .into_iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                        .map(|(_, value)| value);
                    self.state = State::Body { content_type };
                }

                State::Body { content_type } => {
                    let Some(idx) = find(src, self.boundary.marker(), self.scan_from) else {
                        if src.len() > self.config.max_part_size + marker_len {
                            return Err(FrameError::PartTooLarge {
                                size: src.len(),
                                max: self.config.max_part_size,
                            });
                        }
                        self.rescan_tail(src.len(), marker_len);
                        return Ok(None);
                    };

                    let content_type = content_type.take();
                    let mut payload = src.split_to(idx).freeze();
                    src.advance(marker_len);
                    self.scan_from = 0;
                    self.state = State::Headers;

                    if payload.ends_with(b"\r\n") {
                        payload.truncate(payload.len() - 2);
                    } else if payload.ends_with(b"\n") {
                        payload.truncate(payload.len() - 1);
                    }

                    if !self.accepts(content_type.as_deref()) {
                        self.discarded += 1;
                        tracing::debug!(
                            content_type = content_type.as_deref().unwrap_or("<none>"),
                            size = payload.len(),
                            "discarding non-image part"
                        );
                        continue;
                    }
                    if payload.is_empty() {
                        self.discarded += 1;
                        tracing::trace!("discarding empty part");
                        continue;
                    }

                    tracing::trace!(size = payload.len(), "frame decoded");
                    return Ok(Some(FrameEvent {
                        content_type: content_type.unwrap_or_default(),
                        payload,
                    }));
                }

                State::Epilogue => {
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            // A part is only complete once the next marker arrives.
            tracing::debug!(pending = src.len(), "dropping incomplete part at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl StreamCodec for MultipartCodec {
    type Config = MultipartConfig;

    fn for_content_type(content_type: Option<&str>, config: &MultipartConfig) -> Result<Self> {
        let boundary = Boundary::from_content_type(content_type)?;
        tracing::debug!(boundary = boundary.token(), "multipart boundary negotiated");
        Ok(Self::new(boundary, config.clone()))
    }
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, String)>> {
    let text = std::str::from_utf8(block)
        .map_err(|err| FrameError::MalformedHeaders(format!("header block is not UTF-8: {err}")))?;

    let mut headers = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeaders(format!("no ':' in {line:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(FrameError::MalformedHeaders(format!("empty name in {line:?}")));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }
    Ok(headers)
}
