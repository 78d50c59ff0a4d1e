//! Errors produced while classifying a record.

use thiserror::Error;

/// A record that could not be classified. The session drops such records and
/// only fails once too many arrive in a row.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record is not valid JSON.
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The record is `{}` and carries neither data nor a control key.
    #[error("record is an empty JSON object")]
    EmptyObject,

    /// A control message of a known kind has an unusable body.
    #[error("malformed {kind} control message: {source}")]
    MalformedControl {
        /// Control key of the message.
        kind: &'static str,
        /// Deserialisation failure.
        #[source]
        source: serde_json::Error,
    },
}
