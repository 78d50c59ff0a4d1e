//! Optional convenience imports for typical streaming clients.
//!
//! Kept to the types most callers touch. Import specialised APIs from their
//! owning modules.
//!
//! # Examples
//!
//! ```rust,no_run
//! use streamwire::prelude::*;
//!
//! fn client() -> StreamClient<ReqwestTransport> {
//!     StreamClient::builder().build(ReqwestTransport::builder().build().unwrap())
//! }
//! ```

pub use crate::{
    auth::{Authenticator, BearerToken},
    error::StreamError,
    frame::FrameConfig,
    record::Record,
    recovery::{RecoveryConfig, Termination},
    session::{StreamClient, StreamHandle},
    transport::{ReqwestTransport, StreamRequest},
};
