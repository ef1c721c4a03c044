//! Line-delimited text stream decoding.

use std::fmt;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::StreamCodec;
use crate::error::{FrameError, Result};

/// Default maximum length of a single line: 64 KiB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// One decoded line of a text stream, trailing whitespace stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextEvent {
    pub text: String,
}

impl TextEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for TextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Configuration for the line codec.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum bytes in one line, line break excluded. Default: 64 KiB.
    pub max_line_length: usize,
    /// Drop a line identical to the one emitted just before it. Default: true.
    pub dedup_consecutive: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            dedup_consecutive: true,
        }
    }
}

/// Splits a byte stream on `\n` into [`TextEvent`]s.
///
/// Lines are decoded only once complete, so multi-byte characters split across chunks
/// are never seen half-way. Empty lines are dropped; invalid UTF-8 is fatal.
#[derive(Debug)]
pub struct LineCodec {
    config: LineConfig,
    // Bytes before this index are known to contain no line break.
    next_index: usize,
    last: Option<String>,
}

impl LineCodec {
    pub fn new(config: LineConfig) -> Self {
        Self {
            config,
            next_index: 0,
            last: None,
        }
    }

    fn accept(&mut self, raw: &[u8]) -> Result<Option<TextEvent>> {
        let text = std::str::from_utf8(raw)?.trim_end();
        if text.is_empty() {
            return Ok(None);
        }
        if self.config.dedup_consecutive {
            if self.last.as_deref() == Some(text) {
                tracing::trace!(line = text, "dropping repeated line");
                return Ok(None);
            }
            self.last = Some(text.to_string());
        }
        Ok(Some(TextEvent::new(text)))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(LineConfig::default())
    }
}

impl Decoder for LineCodec {
    type Item = TextEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TextEvent>> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            let Some(pos) = newline else {
                if src.len() > self.config.max_line_length {
                    return Err(FrameError::LineTooLong {
                        size: src.len(),
                        max: self.config.max_line_length,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            if pos > self.config.max_line_length {
                return Err(FrameError::LineTooLong {
                    size: pos,
                    max: self.config.max_line_length,
                });
            }

            let line = src.split_to(pos);
            src.advance(1);
            self.next_index = 0;
            if let Some(event) = self.accept(&line)? {
                return Ok(Some(event));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<TextEvent>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Unterminated final line.
        let rest = src.split();
        self.next_index = 0;
        self.accept(&rest)
    }
}

impl StreamCodec for LineCodec {
    type Config = LineConfig;

    fn for_content_type(content_type: Option<&str>, config: &LineConfig) -> Result<Self> {
        if let Some(content_type) = content_type {
            if content_type
                .split(';')
                .next()
                .is_some_and(|media| media.trim().to_ascii_lowercase().starts_with("multipart/"))
            {
                tracing::warn!(content_type, "decoding multipart body as text lines");
            }
        }
        Ok(Self::new(config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{decode_chunks, splits};

    fn texts(events: Vec<TextEvent>) -> Vec<String> {
        events.into_iter().map(|e| e.text).collect()
    }

    #[test]
    fn lines_across_chunks_emit_in_order() {
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[b"A\nB\nC", b"\nD\n"]).unwrap();
        assert_eq!(texts(events), ["A", "B", "C", "D"]);
    }

    #[test]
    fn partial_line_is_retained_until_complete() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"hel");

        buf.extend_from_slice(b"lo\r\nwor");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(TextEvent::new("hello")));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"wor");
    }

    #[test]
    fn empty_and_whitespace_lines_are_dropped() {
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[b"\n\r\n  \t\nx  \n\n"]).unwrap();
        assert_eq!(texts(events), ["x"]);
    }

    #[test]
    fn leading_whitespace_is_kept() {
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[b"  indented\t\r\n"]).unwrap();
        assert_eq!(texts(events), ["  indented"]);
    }

    #[test]
    fn consecutive_duplicates_are_suppressed() {
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[b"a\na\nb\na\na \n"]).unwrap();
        assert_eq!(texts(events), ["a", "b", "a"]);
    }

    #[test]
    fn duplicates_kept_when_dedup_disabled() {
        let mut codec = LineCodec::new(LineConfig {
            dedup_consecutive: false,
            ..LineConfig::default()
        });
        let events = decode_chunks(&mut codec, &[b"a\na\n"]).unwrap();
        assert_eq!(texts(events), ["a", "a"]);
    }

    #[test]
    fn unterminated_last_line_flushed_at_eof() {
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[b"first\nsecond"]).unwrap();
        assert_eq!(texts(events), ["first", "second"]);
    }

    #[test]
    fn invalid_utf8_is_fatal() {
        let mut codec = LineCodec::default();
        let err = decode_chunks(&mut codec, &[b"ok\n\xff\xfe\n"]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidUtf8(_)));
        assert!(err.is_protocol());
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "temp: 21\u{b0}C\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC2).unwrap() + 1;
        let mut codec = LineCodec::default();
        let events = decode_chunks(&mut codec, &[&text[..split], &text[split..]]).unwrap();
        assert_eq!(texts(events), ["temp: 21\u{b0}C"]);
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut codec = LineCodec::new(LineConfig {
            max_line_length: 8,
            ..LineConfig::default()
        });
        let err = decode_chunks(&mut codec, &[b"0123456789"]).unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { max: 8, .. }));

        let mut codec = LineCodec::new(LineConfig {
            max_line_length: 8,
            ..LineConfig::default()
        });
        let err = decode_chunks(&mut codec, &[b"0123456789\nok\n"]).unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { size: 10, .. }));
    }

    #[test]
    fn output_is_independent_of_chunking() {
        let wire = "counter 1: 4\r\ncounter 2: 0\n\n\u{2713} ready\nrepeat\nrepeat\nlast".as_bytes();
        let expected = ["counter 1: 4", "counter 2: 0", "\u{2713} ready", "repeat", "last"];

        for chunks in splits(wire) {
            let mut codec = LineCodec::default();
            let events = decode_chunks(&mut codec, &chunks).unwrap();
            assert_eq!(texts(events), expected, "chunks: {chunks:?}");
        }
    }

    #[test]
    fn multipart_content_type_still_builds_codec() {
        let codec = LineCodec::for_content_type(
            Some("multipart/x-mixed-replace; boundary=frame"),
            &LineConfig::default(),
        );
        assert!(codec.is_ok());
        assert!(LineCodec::for_content_type(None, &LineConfig::default()).is_ok());
    }
}
