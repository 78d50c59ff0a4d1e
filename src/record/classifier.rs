//! Split records into data and control messages.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ControlKind, ControlMessage, RecordError};
use crate::disconnect::DisconnectSignal;

/// Key whose presence marks a data record.
pub const DEFAULT_PAYLOAD_MARKER: &str = "text";
/// Malformed records tolerated in a row before the stream fails.
pub const DEFAULT_MAX_CONSECUTIVE_MALFORMED: u32 = 10;

/// Classification settings.
///
/// # Examples
///
/// ```
/// use streamwire::record::ClassifierConfig;
///
/// let config = ClassifierConfig::default()
///     .payload_marker("id_str")
///     .max_consecutive_malformed(3);
/// assert_eq!(config.max_consecutive_malformed, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Top-level key identifying data records.
    ///
    /// Default: `"text"`.
    pub payload_marker: String,

    /// Consecutive malformed records tolerated before the session fails.
    ///
    /// Default: 10.
    pub max_consecutive_malformed: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            payload_marker: DEFAULT_PAYLOAD_MARKER.to_owned(),
            max_consecutive_malformed: DEFAULT_MAX_CONSECUTIVE_MALFORMED,
        }
    }
}

impl ClassifierConfig {
    /// Set the payload marker key.
    #[must_use]
    pub fn payload_marker(mut self, key: impl Into<String>) -> Self {
        self.payload_marker = key.into();
        self
    }

    /// Set the malformed-record tolerance.
    #[must_use]
    pub fn max_consecutive_malformed(mut self, count: u32) -> Self {
        self.max_consecutive_malformed = count;
        self
    }
}

/// A classified record.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// Application payload.
    Data(Value),
    /// Protocol or informational message.
    Control(ControlMessage),
}

impl Record {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Control(_) => "control",
        }
    }

    /// Control message, if this is one.
    #[must_use]
    pub fn as_control(&self) -> Option<&ControlMessage> {
        match self {
            Self::Control(message) => Some(message),
            Self::Data(_) => None,
        }
    }

    /// The decoded JSON, whatever the classification.
    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Data(value) => value,
            Self::Control(message) => message.body(),
        }
    }
}

/// Parses records and decides whether they are data or control.
///
/// # Examples
///
/// ```
/// use streamwire::record::{ControlKind, Record, RecordClassifier};
///
/// let classifier = RecordClassifier::default();
/// assert!(matches!(
///     classifier.classify(br#"{"text":"hi"}"#),
///     Ok(Record::Data(_))
/// ));
/// let record = classifier
///     .classify(br#"{"disconnect":{"code":12,"reason":"shed"}}"#)
///     .unwrap();
/// let control = record.as_control().unwrap();
/// assert_eq!(control.kind(), &ControlKind::Disconnect);
/// assert_eq!(control.disconnect().unwrap().code.get(), 12);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordClassifier {
    config: ClassifierConfig,
}

impl RecordClassifier {
    /// Create a classifier with `config`.
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self { Self { config } }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig { &self.config }

    /// Classify one delimiter-stripped record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for invalid JSON, an empty object, or a
    /// `disconnect` message whose body lacks a numeric code.
    pub fn classify(&self, record: &[u8]) -> Result<Record, RecordError> {
        let value: Value = serde_json::from_slice(record)?;
        let Value::Object(map) = value else {
            return Ok(Record::Data(value));
        };
        if map.is_empty() {
            return Err(RecordError::EmptyObject);
        }
        if map.contains_key(&self.config.payload_marker) {
            return Ok(Record::Data(Value::Object(map)));
        }
        let kind = control_kind(&map);
        let disconnect = match (&kind, map.get("disconnect")) {
            (ControlKind::Disconnect, Some(body)) => {
                let signal = DisconnectSignal::deserialize(body).map_err(|source| {
                    RecordError::MalformedControl {
                        kind: "disconnect",
                        source,
                    }
                })?;
                Some(signal)
            }
            _ => None,
        };
        Ok(Record::Control(ControlMessage::new(
            kind,
            Value::Object(map),
            disconnect,
        )))
    }
}

fn control_kind(map: &Map<String, Value>) -> ControlKind {
    map.keys()
        .find_map(|key| ControlKind::from_key(key.as_str()))
        .or_else(|| map.keys().next().map(|key| ControlKind::Other(key.clone())))
        .unwrap_or_else(|| ControlKind::Other(String::new()))
}
