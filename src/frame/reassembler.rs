//! Incremental record reassembly across arbitrary chunk boundaries.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::{DelimitedCodec, FrameConfig, FramingError};

/// Accumulates transport chunks and yields complete records.
///
/// Every delimiter in the buffer closes a record, so a chunk carrying several
/// records yields all of them in order. Empty frames are keep-alives and are
/// counted, never yielded. Bytes after the last delimiter stay pending until
/// a later chunk completes them.
///
/// # Examples
///
/// ```
/// use streamwire::frame::{FrameConfig, FrameReassembler};
///
/// let mut reassembler = FrameReassembler::new(FrameConfig::default());
/// assert!(reassembler.feed(b"{\"id\":").unwrap().is_empty());
/// let records = reassembler.feed(b"1}\r\n\r\n{\"id\":2}\r\n").unwrap();
/// assert_eq!(records.len(), 2);
/// assert_eq!(&records[0][..], b"{\"id\":1}");
/// assert_eq!(reassembler.keep_alives(), 1);
/// assert!(reassembler.partial().is_empty());
/// ```
#[derive(Debug)]
pub struct FrameReassembler {
    codec: DelimitedCodec,
    buffer: BytesMut,
    pending_chunks: usize,
    max_pending_chunks: usize,
    deferred: Option<FramingError>,
}

impl FrameReassembler {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new(config: FrameConfig) -> Self {
        Self {
            codec: DelimitedCodec::new(&config),
            buffer: BytesMut::new(),
            pending_chunks: 0,
            max_pending_chunks: config.pending_chunk_limit(),
            deferred: None,
        }
    }

    /// Append `chunk` and return every record it completes.
    ///
    /// Records completed ahead of a framing failure in the same chunk are
    /// returned first. The failure is then held back: read it with
    /// [`take_error`](Self::take_error), or let the next `feed` return it.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooManyChunks`] when more than the configured
    /// number of consecutive chunks leave an unterminated tail, and
    /// [`FramingError::RecordTooLong`] when the tail outgrows the record cap.
    /// The pending bytes stay available through [`partial`](Self::partial)
    /// for diagnostics.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, FramingError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        self.buffer.extend_from_slice(chunk);
        let frames_before = self.codec.frames();
        let mut records = Vec::new();
        let outcome = loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => break self.track_pending(self.codec.frames() > frames_before),
                Err(err) => break Err(err),
            }
        };
        match outcome {
            Ok(()) => Ok(records),
            Err(err) if records.is_empty() => Err(err),
            Err(err) => {
                self.deferred = Some(err);
                Ok(records)
            }
        }
    }

    /// Framing failure held back by the last [`feed`](Self::feed).
    pub fn take_error(&mut self) -> Option<FramingError> { self.deferred.take() }

    /// Bytes received after the last delimiter.
    #[must_use]
    pub fn partial(&self) -> &[u8] { &self.buffer }

    /// Keep-alive frames seen since construction.
    #[must_use]
    pub fn keep_alives(&self) -> u64 { self.codec.keep_alives() }

    /// Discard pending bytes; used at the start of every request attempt.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.codec.reset();
        self.pending_chunks = 0;
        self.deferred = None;
    }

    fn track_pending(&mut self, completed_frame: bool) -> Result<(), FramingError> {
        if self.buffer.is_empty() {
            self.pending_chunks = 0;
            return Ok(());
        }
        self.pending_chunks = if completed_frame {
            1
        } else {
            self.pending_chunks + 1
        };
        if self.pending_chunks > self.max_pending_chunks {
            return Err(FramingError::TooManyChunks {
                chunks: self.pending_chunks,
                max: self.max_pending_chunks,
            });
        }
        Ok(())
    }
}
