//! Test doubles for exercising `streamwire` sessions.
//!
//! [`ScriptedTransport`] replays canned responses in memory, which keeps
//! recovery tests deterministic under paused tokio time. [`StreamServer`]
//! serves the same kind of script over real HTTP/1.1 for tests of
//! [`ReqwestTransport`](streamwire::transport::ReqwestTransport).
//!
//! ```rust
//! use streamwire::transport::TransportErrorKind;
//! use streamwire_testing::{Attempt, ScriptedTransport};
//!
//! let transport = ScriptedTransport::new([
//!     Attempt::ok(200).chunk("{\"text\":\"hi\"}\r\n").fail(TransportErrorKind::PartialTransfer),
//!     Attempt::ok(200).header("Connection: close"),
//! ]);
//! assert_eq!(transport.remaining(), 2);
//! ```

mod logging;
mod scripted;
mod server;

pub use logging::{LoggerHandle, logger};
pub use scripted::{Attempt, ScriptedTransport, reason_phrase};
pub use server::{ReceivedRequest, ServedResponse, StreamServer};
