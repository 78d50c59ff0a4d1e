//! Classification of framed records.
//!
//! Every non-empty record is a JSON document. Objects carrying the payload
//! marker key are application data; other objects are control messages
//! identified by their leading key. [`RecordClassifier`] performs the split
//! and extracts disconnect signals so the session can act on them.

mod classifier;
mod control;
mod error;

pub use classifier::{
    ClassifierConfig,
    DEFAULT_MAX_CONSECUTIVE_MALFORMED,
    DEFAULT_PAYLOAD_MARKER,
    Record,
    RecordClassifier,
};
pub use control::{ControlKind, ControlMessage, LimitNotice, StallWarning};
pub use error::RecordError;
