use tokio_util::codec::Decoder;

use crate::error::{FrameError, Result};

/// A body decoder that can be chosen once the response headers are known.
///
/// Implementations hold all cross-chunk state themselves: `decode` is called with a
/// buffer that only ever grows at the tail, and must leave unconsumed bytes in place.
pub trait StreamCodec: Decoder<Error = FrameError> + Send + Sized + 'static {
    /// Codec-specific limits and options.
    type Config: Clone + Send + Sync + 'static;

    /// Build a codec for a response with the given `Content-Type` header.
    ///
    /// Fails before any event is decoded if the header is unusable for this codec.
    fn for_content_type(content_type: Option<&str>, config: &Self::Config) -> Result<Self>;
}

/// Position of the first occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_respects_start_offset() {
        let hay = b"--a--a";
        assert_eq!(find(hay, b"--a", 0), Some(0));
        assert_eq!(find(hay, b"--a", 1), Some(3));
        assert_eq!(find(hay, b"--a", 4), None);
    }

    #[test]
    fn find_handles_short_haystack() {
        assert_eq!(find(b"--", b"--frame", 0), None);
        assert_eq!(find(b"", b"x", 0), None);
        assert_eq!(find(b"abc", b"", 0), None);
    }
}
