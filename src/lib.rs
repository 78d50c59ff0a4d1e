#![doc(html_root_url = "https://docs.rs/streamwire/latest")]
//! Public API for the `streamwire` library.
//!
//! This crate consumes long-lived HTTP push streams whose body is a sequence
//! of delimiter-separated JSON records. It reassembles records from arbitrary
//! chunk boundaries, separates data from control messages, and reconnects
//! with per-domain backoff until the stream ends, is cancelled, or fails.

pub mod auth;
pub mod disconnect;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod prelude;
pub mod record;
pub mod recovery;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use auth::{AuthError, Authenticator, BearerToken, NoAuth, StaticHeader};
pub use disconnect::{DisconnectCategory, DisconnectCode, DisconnectSignal};
pub use endpoint::{Endpoint, EndpointError, EndpointId};
pub use error::{FailureContext, HttpStatusError, StreamError};
pub use frame::{DelimitedCodec, Delimiter, FrameConfig, FrameReassembler, FramingError};
pub use metrics::{CHUNKS_TOTAL, ERRORS_TOTAL, RECORDS_TOTAL, RETRIES_TOTAL};
pub use record::{ControlKind, ControlMessage, Record, RecordClassifier, RecordError};
pub use recovery::{BackoffPolicy, Outcome, RecoveryConfig, RecoveryMachine, Termination};
pub use registry::{SessionId, SessionRegistry};
pub use session::{StreamClient, StreamClientBuilder, StreamHandle, StreamStats};
pub use transport::{ReqwestTransport, StreamRequest, Transport, TransportError};
