//! The HTTP transport seam.
//!
//! A [`Transport`] performs one streaming request and pushes everything it
//! receives into a [`ResponseSink`]: first the status line and headers, one
//! line per call, then body chunks as they arrive. The sink may ask the
//! transport to stop by returning [`Flow::Abort`]; the transport then fails
//! the request with [`TransportErrorKind::WriteAborted`].
//!
//! [`ReqwestTransport`] is the production implementation over `reqwest`.

mod error;
mod http;
mod low_speed;
mod request;

use async_trait::async_trait;
pub use error::{TransportError, TransportErrorKind};
pub use http::{DEFAULT_CONNECT_TIMEOUT, ReqwestTransport, ReqwestTransportBuilder};
pub use low_speed::LowSpeedLimit;
pub use request::{Method, PreparedRequest, RequestHeader, StreamRequest, UnknownMethod};

/// Whether the transport should keep delivering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Stop and fail the request with a write abort.
    Abort,
}

/// Receives the response of one request attempt.
pub trait ResponseSink: Send {
    /// Called once per header line, status line first.
    fn on_header(&mut self, line: &str) -> Flow;

    /// Called for each body chunk in arrival order.
    fn on_data(&mut self, chunk: &[u8]) -> Flow;
}

/// Performs streaming HTTP requests.
#[async_trait]
pub trait Transport: Send {
    /// Run `request` to completion, feeding the response into `sink`.
    ///
    /// Returns `Ok(())` when the server ends the body cleanly, whatever the
    /// status code.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the connection fails, the body is
    /// cut short, the low-speed limit is breached, or the sink aborts.
    async fn perform(
        &mut self,
        request: &PreparedRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError>;

    /// Final status code of the last performed request, if one was received.
    fn final_status(&self) -> Option<u16>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn perform(
        &mut self,
        request: &PreparedRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError> {
        (**self).perform(request, sink).await
    }

    fn final_status(&self) -> Option<u16> { (**self).final_status() }
}
