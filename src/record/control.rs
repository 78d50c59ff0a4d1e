//! Control message vocabulary.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::disconnect::DisconnectSignal;

/// Kind of a control message, taken from its leading key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Status deletion notice.
    Delete,
    /// Location deletion notice.
    ScrubGeo,
    /// Undelivered-match notice.
    Limit,
    /// Status withheld in some countries.
    StatusWithheld,
    /// User withheld in some countries.
    UserWithheld,
    /// Server is about to close the connection.
    Disconnect,
    /// Stall warning.
    Warning,
    /// Friends list preamble.
    Friends,
    /// Friends list preamble with string identifiers.
    FriendsStr,
    /// User or site event.
    Event,
    /// Site stream control envelope.
    Control,
    /// Any other leading key.
    Other(String),
}

impl ControlKind {
    const VOCABULARY: [(&'static str, ControlKind); 11] = [
        ("delete", Self::Delete),
        ("scrub_geo", Self::ScrubGeo),
        ("limit", Self::Limit),
        ("status_withheld", Self::StatusWithheld),
        ("user_withheld", Self::UserWithheld),
        ("disconnect", Self::Disconnect),
        ("warning", Self::Warning),
        ("friends", Self::Friends),
        ("friends_str", Self::FriendsStr),
        ("event", Self::Event),
        ("control", Self::Control),
    ];

    /// Look up a known control key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::VOCABULARY
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| kind.clone())
    }

    /// Key naming this kind on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Delete => "delete",
            Self::ScrubGeo => "scrub_geo",
            Self::Limit => "limit",
            Self::StatusWithheld => "status_withheld",
            Self::UserWithheld => "user_withheld",
            Self::Disconnect => "disconnect",
            Self::Warning => "warning",
            Self::Friends => "friends",
            Self::FriendsStr => "friends_str",
            Self::Event => "event",
            Self::Control => "control",
            Self::Other(key) => key,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Count of matches the server could not deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct LimitNotice {
    /// Undelivered matches since the connection opened.
    pub track: u64,
}

/// Warning that the client is falling behind.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StallWarning {
    /// Warning code, e.g. `FALLING_BEHIND`.
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Fill level of the server-side queue.
    #[serde(default)]
    pub percent_full: Option<u8>,
}

/// A classified non-data record.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlMessage {
    kind: ControlKind,
    body: Value,
    disconnect: Option<DisconnectSignal>,
}

impl ControlMessage {
    pub(crate) fn new(kind: ControlKind, body: Value, disconnect: Option<DisconnectSignal>) -> Self {
        Self {
            kind,
            body,
            disconnect,
        }
    }

    /// Kind of the message.
    #[must_use]
    pub fn kind(&self) -> &ControlKind { &self.kind }

    /// Whole JSON object as received.
    #[must_use]
    pub fn body(&self) -> &Value { &self.body }

    /// Consume the message and return its JSON object.
    #[must_use]
    pub fn into_body(self) -> Value { self.body }

    /// Disconnect signal carried by a `disconnect` message.
    #[must_use]
    pub fn disconnect(&self) -> Option<&DisconnectSignal> { self.disconnect.as_ref() }

    /// Typed view of a `limit` message.
    #[must_use]
    pub fn limit(&self) -> Option<LimitNotice> { self.typed("limit") }

    /// Typed view of a `warning` message.
    #[must_use]
    pub fn warning(&self) -> Option<StallWarning> { self.typed("warning") }

    fn typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        if self.kind.as_str() != key {
            return None;
        }
        T::deserialize(self.body.get(key)?).ok()
    }
}
