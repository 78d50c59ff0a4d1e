//! Streaming sessions.
//!
//! [`StreamClient::open_stream`] drives one request through repeated
//! connection attempts. Each attempt signs the request afresh, resets the
//! frame buffer and per-attempt statistics, and feeds the response through
//! the reassembler and classifier into the caller's callback. When the
//! attempt ends the [`RecoveryMachine`](crate::recovery::RecoveryMachine)
//! decides whether to back off and reconnect or to stop.
//!
//! A [`StreamHandle`] lets other tasks watch statistics and request a
//! cooperative abort while `open_stream` is running.

mod client;
mod handle;
mod sink;
mod stats;

pub use client::{DEFAULT_USER_AGENT, StreamClient, StreamClientBuilder};
pub(crate) use handle::SessionShared;
pub use handle::StreamHandle;
pub use sink::MAX_ERROR_BODY;
pub use stats::{StreamStats, format_dhms};

#[cfg(test)]
mod tests;
