//! Delimiter framing for push-stream response bodies.
//!
//! The server writes one record per line, separated by a fixed byte
//! [`Delimiter`] (CRLF by default), and periodically emits a bare delimiter
//! as a keep-alive. Transport chunk boundaries are unrelated to record
//! boundaries, so [`FrameReassembler`] accumulates chunks and yields each
//! record exactly once as soon as its closing delimiter arrives.
//!
//! [`DelimitedCodec`] exposes the same framing rules as a
//! [`tokio_util::codec::Decoder`] for byte sources that are already
//! `AsyncRead`, such as captured stream files.

mod codec;
mod config;
mod error;
mod reassembler;

pub use codec::DelimitedCodec;
pub use config::{
    DEFAULT_MAX_PENDING_CHUNKS,
    DEFAULT_MAX_RECORD_LENGTH,
    Delimiter,
    FrameConfig,
    MAX_RECORD_LENGTH,
    MIN_RECORD_LENGTH,
};
pub use error::FramingError;
pub use reassembler::FrameReassembler;
