//! Transport failure codes.

use thiserror::Error;

/// Category of a transport failure, with the numeric codes used in logs and
/// failure contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Could not connect to the server (code 7).
    CouldNotConnect,
    /// The body ended before the server said it would (code 18).
    PartialTransfer,
    /// The response sink refused data (code 23).
    WriteAborted,
    /// Low-speed limit breached or request timed out (code 28).
    TimedOut,
    /// Anything else, with the underlying code when known.
    Other(i32),
}

impl TransportErrorKind {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::CouldNotConnect => 7,
            Self::PartialTransfer => 18,
            Self::WriteAborted => 23,
            Self::TimedOut => 28,
            Self::Other(code) => code,
        }
    }

    /// Kind for a numeric code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            7 => Self::CouldNotConnect,
            18 => Self::PartialTransfer,
            23 => Self::WriteAborted,
            28 => Self::TimedOut,
            other => Self::Other(other),
        }
    }

    /// Whether a retry may help.
    #[must_use]
    pub const fn is_transient(self) -> bool { matches!(self, Self::PartialTransfer | Self::TimedOut) }
}

/// A failed request attempt.
///
/// # Examples
///
/// ```
/// use streamwire::transport::{TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::PartialTransfer, "body cut short");
/// assert_eq!(err.code(), 18);
/// assert_eq!(err.to_string(), "transport error 18: body cut short");
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("transport error {}: {message}", .kind.code())]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Build an error of `kind`.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error reported when the sink aborts delivery.
    #[must_use]
    pub fn write_aborted() -> Self {
        Self::new(TransportErrorKind::WriteAborted, "failed writing received data")
    }

    /// Category.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind { self.kind }

    /// Numeric code.
    #[must_use]
    pub fn code(&self) -> i32 { self.kind.code() }

    /// Message from the transport.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::TimedOut
        } else if error.is_connect() {
            TransportErrorKind::CouldNotConnect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::PartialTransfer
        } else {
            TransportErrorKind::Other(0)
        };
        Self::new(kind, error.to_string())
    }
}
