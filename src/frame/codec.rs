//! `Decoder` implementation of delimiter framing.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::{Delimiter, FrameConfig, FramingError};

/// Splits a buffer on a delimiter, skipping keep-alives.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use streamwire::frame::{DelimitedCodec, FrameConfig};
/// use tokio_util::codec::Decoder;
///
/// let mut codec = DelimitedCodec::new(&FrameConfig::default());
/// let mut buf = BytesMut::from(&b"\r\n{\"a\":1}\r\n{\"b\""[..]);
/// let record = codec.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(&record[..], b"{\"a\":1}");
/// assert_eq!(codec.keep_alives(), 1);
/// assert!(codec.decode(&mut buf).unwrap().is_none());
/// assert_eq!(&buf[..], b"{\"b\"");
/// ```
#[derive(Clone, Debug)]
pub struct DelimitedCodec {
    delimiter: Delimiter,
    max_record_len: usize,
    scan_from: usize,
    frames: u64,
    keep_alives: u64,
}

impl DelimitedCodec {
    /// Create a codec using the delimiter and record cap from `config`.
    #[must_use]
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            delimiter: config.delimiter_bytes().clone(),
            max_record_len: config.record_len_limit(),
            scan_from: 0,
            frames: 0,
            keep_alives: 0,
        }
    }

    /// Frames completed so far, keep-alives included.
    #[must_use]
    pub fn frames(&self) -> u64 { self.frames }

    /// Keep-alive frames skipped so far.
    #[must_use]
    pub fn keep_alives(&self) -> u64 { self.keep_alives }

    /// Forget the scan position. Call after the caller clears the buffer.
    pub fn reset(&mut self) { self.scan_from = 0; }

    fn next_frame(&mut self, src: &mut BytesMut) -> Option<Bytes> {
        let start = self.scan_from.min(src.len());
        if let Some(offset) = self.delimiter.find_in(&src[start..]) {
            let end = start + offset;
            let mut frame = src.split_to(end + self.delimiter.len());
            frame.truncate(end);
            self.scan_from = 0;
            self.frames += 1;
            return Some(frame.freeze());
        }
        // a delimiter may straddle the next chunk boundary
        self.scan_from = src.len().saturating_sub(self.delimiter.len() - 1);
        None
    }
}

impl Decoder for DelimitedCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(frame) = self.next_frame(src) {
            if frame.is_empty() {
                self.keep_alives += 1;
                continue;
            }
            return Ok(Some(frame));
        }
        if src.len() > self.max_record_len {
            return Err(FramingError::RecordTooLong {
                len: src.len(),
                max: self.max_record_len,
            });
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len();
        src.clear();
        self.reset();
        Err(FramingError::TruncatedRecord { len })
    }
}
