//! Errors raised while splitting a byte stream into records.

use std::io;

use thiserror::Error;

/// Failure to frame the response body.
///
/// Every variant except [`FramingError::Io`] is terminal for the request: a
/// body that never produces a delimiter is not the stream format the
/// reassembler understands, and retrying will not change that.
#[derive(Debug, Error)]
pub enum FramingError {
    /// A delimiter must contain at least one byte.
    #[error("record delimiter must not be empty")]
    EmptyDelimiter,

    /// Too many consecutive chunks arrived without completing a record.
    #[error("stream is not delimiter framed: {chunks} consecutive chunks without a delimiter (max {max})")]
    TooManyChunks {
        /// Chunks received since the last completed record.
        chunks: usize,
        /// Configured limit.
        max: usize,
    },

    /// The unterminated tail grew beyond the record length cap.
    #[error("record exceeds max length: {len} > {max}")]
    RecordTooLong {
        /// Bytes buffered for the current record.
        len: usize,
        /// Configured cap.
        max: usize,
    },

    /// The byte source ended in the middle of a record.
    #[error("stream ended inside a record: {len} bytes without a delimiter")]
    TruncatedRecord {
        /// Bytes buffered when the source ended.
        len: usize,
    },

    /// Reading the byte source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FramingError {
    /// Whether the error reports an overflow of the pending buffer.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::TooManyChunks { .. } | Self::RecordTooLong { .. })
    }
}
