//! Terminal errors returned by [`StreamClient::open_stream`](crate::session::StreamClient::open_stream).
//!
//! Every variant carries a [`FailureContext`] describing the attempt that
//! failed, including any record bytes still waiting for a delimiter. Those
//! bytes are surfaced here and never dispatched as a record.

use std::fmt;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    auth::AuthError,
    disconnect::DisconnectSignal,
    frame::FramingError,
    record::RecordError,
    transport::TransportError,
};

/// State of the session when it failed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureContext {
    /// Last HTTP status seen, provisional or final.
    pub http_status: Option<u16>,
    /// Transport error code of the failing attempt.
    pub transport_code: Option<i32>,
    /// Bytes received after the last complete record.
    pub partial_record: Bytes,
    /// One-based attempt number.
    pub attempt: u32,
}

/// Entry of a JSON error body, `{"errors":[{"message":..,"code":..}]}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    /// Server message.
    pub message: String,
    /// Server error code.
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    errors: Vec<ApiError>,
}

/// The server answered with a status of 300 or above.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("HTTP status {status}{}", DisplayApiError(.api_error.as_ref()))]
pub struct HttpStatusError {
    /// Final status code.
    pub status: u16,
    /// Response body, or the last partial record when the body was empty.
    pub body: Bytes,
    /// First entry of a JSON error body.
    pub api_error: Option<ApiError>,
}

impl HttpStatusError {
    /// Build an error, parsing `body` for a JSON error description.
    #[must_use]
    pub fn new(status: u16, body: Bytes) -> Self {
        let api_error = serde_json::from_slice::<ApiErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.errors.into_iter().next());
        Self {
            status,
            body,
            api_error,
        }
    }

    /// Whether the status is one the server uses for temporary overload.
    #[must_use]
    pub fn is_server_busy(&self) -> bool { matches!(self.status, 500 | 502 | 503 | 504) }
}

struct DisplayApiError<'a>(Option<&'a ApiError>);

impl fmt::Display for DisplayApiError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ApiError {
                message,
                code: Some(code),
            }) => write!(f, ": {message} (code {code})"),
            Some(ApiError {
                message,
                code: None,
            }) => write!(f, ": {message}"),
            None => Ok(()),
        }
    }
}

/// Why a disconnect ended the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectFailure {
    /// The code forbids reconnecting.
    Fatal,
    /// The code has no recovery rule.
    Unhandled,
    /// The code allows reconnecting but the transport budget is spent.
    RetriesExhausted,
}

impl fmt::Display for DisconnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fatal => "unrecoverable",
            Self::Unhandled => "unhandled",
            Self::RetriesExhausted => "retries exhausted on",
        })
    }
}

/// Terminal failure of a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The body is not delimiter framed.
    #[error("framing failed: {source}")]
    Framing {
        /// Framing failure.
        #[source]
        source: FramingError,
        /// Failing attempt.
        context: FailureContext,
    },

    /// Too many consecutive records could not be classified.
    #[error("too many malformed records, last: {source}")]
    MalformedRecords {
        /// Last classification failure.
        #[source]
        source: RecordError,
        /// Failing attempt.
        context: FailureContext,
    },

    /// The transport failed and no retry applies.
    #[error("{source}")]
    Transport {
        /// Transport failure.
        #[source]
        source: TransportError,
        /// Failing attempt.
        context: FailureContext,
    },

    /// The server answered with an error status and no retry applies.
    #[error("{source}")]
    HttpStatus {
        /// Status and diagnostic body.
        #[source]
        source: HttpStatusError,
        /// Failing attempt.
        context: FailureContext,
    },

    /// The server disconnected with a code that ends the stream.
    #[error("{failure} {signal}")]
    Disconnect {
        /// Disconnect code and reason.
        signal: DisconnectSignal,
        /// Why the code is terminal.
        failure: DisconnectFailure,
        /// Failing attempt.
        context: FailureContext,
    },

    /// No credential could be produced.
    #[error("authentication failed: {source}")]
    Authentication {
        /// Signing failure.
        #[source]
        source: AuthError,
        /// Attempt that could not be signed.
        context: FailureContext,
    },

    /// The server kept accepting and closing without sending data.
    #[error("server closed the connection without data on {attempts} attempts")]
    ConnectionClosed {
        /// Attempts made.
        attempts: u32,
        /// Last attempt.
        context: FailureContext,
    },
}

impl StreamError {
    /// Context of the failing attempt.
    #[must_use]
    pub fn context(&self) -> &FailureContext {
        match self {
            Self::Framing { context, .. }
            | Self::MalformedRecords { context, .. }
            | Self::Transport { context, .. }
            | Self::HttpStatus { context, .. }
            | Self::Disconnect { context, .. }
            | Self::Authentication { context, .. }
            | Self::ConnectionClosed { context, .. } => context,
        }
    }

    /// Bytes that never formed a complete record.
    #[must_use]
    pub fn partial_record(&self) -> &Bytes { &self.context().partial_record }

    /// Label for metrics and logs.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing { .. } => "framing",
            Self::MalformedRecords { .. } => "malformed",
            Self::Transport { .. } => "transport",
            Self::HttpStatus { .. } => "http_status",
            Self::Disconnect { .. } => "disconnect",
            Self::Authentication { .. } => "auth",
            Self::ConnectionClosed { .. } => "connection_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn api_error_body_is_parsed() {
        let err = HttpStatusError::new(
            420,
            Bytes::from_static(br#"{"errors":[{"message":"Enhance your calm","code":88}]}"#),
        );
        assert_eq!(
            err.api_error,
            Some(ApiError {
                message: "Enhance your calm".to_owned(),
                code: Some(88),
            })
        );
        assert_eq!(err.to_string(), "HTTP status 420: Enhance your calm (code 88)");
    }

    #[test]
    fn plain_body_has_no_api_error() {
        let err = HttpStatusError::new(401, Bytes::from_static(b"Unauthorized"));
        assert!(err.api_error.is_none());
        assert_eq!(err.to_string(), "HTTP status 401");
    }

    #[rstest]
    #[case(500, true)]
    #[case(503, true)]
    #[case(504, true)]
    #[case(501, false)]
    #[case(420, false)]
    fn busy_statuses(#[case] status: u16, #[case] busy: bool) {
        assert_eq!(HttpStatusError::new(status, Bytes::new()).is_server_busy(), busy);
    }

    #[test]
    fn disconnect_display_names_failure() {
        let err = StreamError::Disconnect {
            signal: DisconnectSignal::new(2_u16, "dup"),
            failure: DisconnectFailure::Fatal,
            context: FailureContext::default(),
        };
        assert_eq!(err.to_string(), "unrecoverable disconnect 2 (duplicate stream): dup");
        assert_eq!(err.error_type(), "disconnect");
    }
}
