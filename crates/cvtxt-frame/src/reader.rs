use bytes::BytesMut;
use cvtxt_transport::ByteStream;
use futures_util::StreamExt as _;
use tokio_util::codec::Decoder;

use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Reads complete events from a chunked response body.
///
/// Handles partial reads internally: callers always get complete events, and one
/// buffer is carried across chunk boundaries for the whole stream.
pub struct ChunkReader<C> {
    inner: ByteStream,
    buf: BytesMut,
    codec: C,
    eof: bool,
    bytes_received: u64,
}

impl<C> ChunkReader<C>
where
    C: Decoder<Error = FrameError>,
{
    pub fn new(inner: ByteStream, codec: C) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec,
            eof: false,
            bytes_received: 0,
        }
    }

    /// Read the next complete event.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` once the body has ended and every
    /// complete event has been returned. Cancel-safe: dropping the future between
    /// chunks loses no buffered bytes.
    pub async fn read_event(&mut self) -> Result<C::Item> {
        loop {
            if self.eof {
                return match self.codec.decode_eof(&mut self.buf)? {
                    Some(event) => Ok(event),
                    None => Err(FrameError::ConnectionClosed),
                };
            }

            if let Some(event) = self.codec.decode(&mut self.buf)? {
                return Ok(event);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.bytes_received += chunk.len() as u64;
                    self.buf.extend_from_slice(&chunk);
                }
                Some(Err(err)) => return Err(FrameError::Transport(err)),
                None => {
                    tracing::debug!(
                        bytes_received = self.bytes_received,
                        pending = self.buf.len(),
                        "response body ended"
                    );
                    self.eof = true;
                }
            }
        }
    }

    /// Total body bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Bytes buffered but not yet consumed by the codec.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C> std::fmt::Debug for ChunkReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("pending", &self.buf.len())
            .field("eof", &self.eof)
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cvtxt_transport::TransportError;
    use futures_util::stream;

    use super::*;
    use crate::line::{LineCodec, TextEvent};
    use crate::multipart::{Boundary, MultipartCodec, MultipartConfig};

    fn body(chunks: &[&'static [u8]]) -> ByteStream {
        let items: Vec<cvtxt_transport::Result<Bytes>> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk)))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn reads_lines_then_reports_close() {
        let mut reader = ChunkReader::new(body(&[b"A\nB\nC", b"\nD\n"]), LineCodec::default());

        let mut lines = Vec::new();
        let err = loop {
            match reader.read_event().await {
                Ok(event) => lines.push(event),
                Err(err) => break err,
            }
        };

        assert_eq!(
            lines,
            ["A", "B", "C", "D"].map(TextEvent::new).to_vec()
        );
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reader.bytes_received(), 8);
    }

    #[tokio::test]
    async fn close_mid_part_ends_without_frame() {
        let codec = MultipartCodec::new(Boundary::new("frame").unwrap(), MultipartConfig::default());
        let mut reader = ChunkReader::new(
            body(&[b"--frame\r\nContent-Type: image/jpeg\r\n\r\n", b"\xff\xd8partial"]),
            codec,
        );

        let err = reader.read_event().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reader.pending(), 0);
    }

    #[tokio::test]
    async fn frames_arrive_byte_by_byte() {
        const WIRE: &[u8] =
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n0123456789\r\n--frame\r\nContent-Type: image/jpeg\r\n\r\nabc\r\n--frame";
        let chunks: Vec<cvtxt_transport::Result<Bytes>> = WIRE
            .iter()
            .map(|b| Ok(Bytes::copy_from_slice(&[*b])))
            .collect();
        let codec = MultipartCodec::new(Boundary::new("frame").unwrap(), MultipartConfig::default());
        let mut reader = ChunkReader::new(Box::pin(stream::iter(chunks)), codec);

        assert_eq!(reader.read_event().await.unwrap().payload.as_ref(), b"0123456789");
        assert_eq!(reader.read_event().await.unwrap().payload.as_ref(), b"abc");
        assert!(matches!(
            reader.read_event().await.unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn transport_error_is_surfaced() {
        let items: Vec<cvtxt_transport::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::Timeout {
                url: "http://ctrl/controller/message-stream".to_string(),
            }),
        ];
        let mut reader = ChunkReader::new(Box::pin(stream::iter(items)), LineCodec::default());

        let err = reader.read_event().await.unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Timeout { .. })));
        assert!(!err.is_protocol());
    }

    #[tokio::test]
    async fn decode_error_is_surfaced() {
        let mut reader = ChunkReader::new(body(&[b"ok\n", b"\xc3\x28\n"]), LineCodec::default());
        assert_eq!(reader.read_event().await.unwrap().text, "ok");
        assert!(matches!(
            reader.read_event().await.unwrap_err(),
            FrameError::InvalidUtf8(_)
        ));
    }
}
