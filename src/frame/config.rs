//! Framing configuration: delimiter choice and overflow limits.

use std::fmt;

use bytes::Bytes;

use super::FramingError;

/// Smallest accepted record length cap.
pub const MIN_RECORD_LENGTH: usize = 64;
/// Largest accepted record length cap.
pub const MAX_RECORD_LENGTH: usize = 64 * 1024 * 1024;
/// Default cap on the size of a single record.
pub const DEFAULT_MAX_RECORD_LENGTH: usize = 16 * 1024 * 1024;
/// Default number of consecutive chunks that may leave an unterminated tail.
pub const DEFAULT_MAX_PENDING_CHUNKS: usize = 100;

/// Non-empty byte sequence separating records on the wire.
///
/// # Examples
///
/// ```
/// use streamwire::frame::Delimiter;
///
/// assert_eq!(Delimiter::default().as_bytes(), b"\r\n");
/// assert!(Delimiter::new("\n").is_ok());
/// assert!(Delimiter::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Delimiter(Bytes);

impl Delimiter {
    /// The carriage-return line-feed pair used by the public streaming APIs.
    pub const CRLF: &'static [u8] = b"\r\n";

    /// Build a delimiter from arbitrary bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EmptyDelimiter`] when `bytes` is empty.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, FramingError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FramingError::EmptyDelimiter);
        }
        Ok(Self(bytes))
    }

    /// Parse a delimiter written with `\r`, `\n`, `\t` and `\\` escapes.
    ///
    /// Used by the command line where raw control characters are awkward.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EmptyDelimiter`] when the unescaped value is empty.
    pub fn from_escaped(text: &str) -> Result<Self, FramingError> {
        let mut out = Vec::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                let mut buf = [0_u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            match chars.next() {
                Some('r') => out.push(b'\r'),
                Some('n') => out.push(b'\n'),
                Some('t') => out.push(b'\t'),
                Some('\\') | None => out.push(b'\\'),
                Some(other) => {
                    out.push(b'\\');
                    let mut buf = [0_u8; 4];
                    out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        Self::new(out)
    }

    /// Raw delimiter bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Delimiter length in bytes; always at least one.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Always `false`; provided for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Index of the first occurrence of the delimiter in `haystack`.
    pub(crate) fn find_in(&self, haystack: &[u8]) -> Option<usize> {
        let needle = self.as_bytes();
        if haystack.len() < needle.len() {
            return None;
        }
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}

impl Default for Delimiter {
    fn default() -> Self { Self(Bytes::from_static(Self::CRLF)) }
}

impl fmt::Debug for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delimiter({:?})", self.0.escape_ascii().to_string())
    }
}

/// Framing limits applied by [`FrameReassembler`](super::FrameReassembler)
/// and [`DelimitedCodec`](super::DelimitedCodec).
///
/// # Examples
///
/// ```
/// use streamwire::frame::{FrameConfig, MIN_RECORD_LENGTH};
///
/// let config = FrameConfig::default().max_pending_chunks(8).max_record_len(1);
/// assert_eq!(config.pending_chunk_limit(), 8);
/// assert_eq!(config.record_len_limit(), MIN_RECORD_LENGTH);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    delimiter: Delimiter,
    max_pending_chunks: usize,
    max_record_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::default(),
            max_pending_chunks: DEFAULT_MAX_PENDING_CHUNKS,
            max_record_len: DEFAULT_MAX_RECORD_LENGTH,
        }
    }
}

impl FrameConfig {
    /// Set the record delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set how many consecutive chunks may end without a delimiter before
    /// the stream is treated as unframed. Values below one are raised to one.
    #[must_use]
    pub fn max_pending_chunks(mut self, chunks: usize) -> Self {
        self.max_pending_chunks = chunks.max(1);
        self
    }

    /// Set the maximum size of a single record, clamped to
    /// [`MIN_RECORD_LENGTH`]..=[`MAX_RECORD_LENGTH`].
    #[must_use]
    pub fn max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len.clamp(MIN_RECORD_LENGTH, MAX_RECORD_LENGTH);
        self
    }

    /// Configured delimiter.
    #[must_use]
    pub fn delimiter_bytes(&self) -> &Delimiter { &self.delimiter }

    /// Configured pending chunk limit.
    #[must_use]
    pub fn pending_chunk_limit(&self) -> usize { self.max_pending_chunks }

    /// Configured record length cap.
    #[must_use]
    pub fn record_len_limit(&self) -> usize { self.max_record_len }
}
