//! Disconnect codes and the signals that carry them.
//!
//! Codes below [`LOCAL_CODE_MIN`] come from the server's `disconnect`
//! control message. Codes at or above it are local: they are set by the
//! caller through [`StreamHandle::request_abort`](crate::session::StreamHandle::request_abort)
//! and always end the stream gracefully.

use std::fmt;

use serde::{Deserialize, Serialize};

/// First code reserved for locally requested disconnects.
pub const LOCAL_CODE_MIN: u16 = 1000;
/// Code used when the caller interrupts the stream without a specific reason.
pub const LOCAL_ABORT: u16 = 1001;

/// How the recovery layer treats a disconnect code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisconnectCategory {
    /// The server will refuse an immediate reconnect; do not retry.
    Fatal,
    /// The server shed the connection; retry after a transport back-off.
    Transient,
    /// A server code with no defined recovery.
    Unhandled,
    /// Requested by the local caller; end gracefully.
    Local,
}

/// Numeric disconnect reason.
///
/// # Examples
///
/// ```
/// use streamwire::disconnect::{DisconnectCategory, DisconnectCode};
///
/// assert_eq!(DisconnectCode::new(2).category(), DisconnectCategory::Fatal);
/// assert_eq!(DisconnectCode::new(12).category(), DisconnectCategory::Transient);
/// assert_eq!(DisconnectCode::new(1001).category(), DisconnectCategory::Local);
/// assert_eq!(DisconnectCode::new(12).name(), Some("shed load"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectCode(u16);

impl DisconnectCode {
    /// Wrap a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self { Self(code) }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }

    /// Whether the code was requested locally.
    #[must_use]
    pub const fn is_local(self) -> bool { self.0 >= LOCAL_CODE_MIN }

    /// Recovery category for this code.
    #[must_use]
    pub const fn category(self) -> DisconnectCategory {
        match self.0 {
            2 | 4 | 7 => DisconnectCategory::Fatal,
            1 | 10 | 11 | 12 => DisconnectCategory::Transient,
            code if code >= LOCAL_CODE_MIN => DisconnectCategory::Local,
            _ => DisconnectCategory::Unhandled,
        }
    }

    /// Short description of a server-assigned code.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "shutdown",
            2 => "duplicate stream",
            3 => "control request",
            4 => "stall",
            5 => "normal",
            6 => "token revoked",
            7 => "admin logout",
            8 => "reserved",
            9 => "max message limit",
            10 => "stream exception",
            11 => "broker stall",
            12 => "shed load",
            _ => return None,
        })
    }
}

impl From<u16> for DisconnectCode {
    fn from(code: u16) -> Self { Self(code) }
}

impl fmt::Display for DisconnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({name})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A pending disconnect: who asked and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectSignal {
    /// Disconnect code.
    pub code: DisconnectCode,
    /// Human-readable reason; may be empty.
    #[serde(default)]
    pub reason: String,
}

impl DisconnectSignal {
    /// Build a signal from a code and reason.
    #[must_use]
    pub fn new(code: impl Into<DisconnectCode>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Signal used for a plain caller interrupt.
    #[must_use]
    pub fn interrupted() -> Self { Self::new(LOCAL_ABORT, "interrupted") }

    /// Recovery category of the carried code.
    #[must_use]
    pub fn category(&self) -> DisconnectCategory { self.code.category() }
}

impl fmt::Display for DisconnectSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "disconnect {}", self.code)
        } else {
            write!(f, "disconnect {}: {}", self.code, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(2, DisconnectCategory::Fatal)]
    #[case(4, DisconnectCategory::Fatal)]
    #[case(7, DisconnectCategory::Fatal)]
    #[case(1, DisconnectCategory::Transient)]
    #[case(10, DisconnectCategory::Transient)]
    #[case(11, DisconnectCategory::Transient)]
    #[case(12, DisconnectCategory::Transient)]
    #[case(3, DisconnectCategory::Unhandled)]
    #[case(9, DisconnectCategory::Unhandled)]
    #[case(999, DisconnectCategory::Unhandled)]
    #[case(1000, DisconnectCategory::Local)]
    #[case(1001, DisconnectCategory::Local)]
    fn codes_map_to_categories(#[case] code: u16, #[case] expected: DisconnectCategory) {
        assert_eq!(DisconnectCode::new(code).category(), expected);
    }

    #[test]
    fn signal_deserialises_from_server_body() {
        let signal: DisconnectSignal =
            serde_json::from_str(r#"{"code":4,"stream_name":"x","reason":"stall"}"#)
                .expect("valid disconnect body");
        assert_eq!(signal, DisconnectSignal::new(4_u16, "stall"));
    }

    #[test]
    fn display_includes_code_name() {
        let signal = DisconnectSignal::new(12_u16, "load shed");
        assert_eq!(signal.to_string(), "disconnect 12 (shed load): load shed");
    }
}
