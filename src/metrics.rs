//! Metric helpers for `streamwire`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::recovery::RecoveryDomain;

/// Name of the counter tracking dispatched records, labelled by `kind`.
pub const RECORDS_TOTAL: &str = "streamwire_records_total";
/// Name of the counter tracking received body chunks.
pub const CHUNKS_TOTAL: &str = "streamwire_chunks_total";
/// Name of the counter tracking scheduled retries, labelled by `domain`.
pub const RETRIES_TOTAL: &str = "streamwire_retries_total";
/// Name of the counter tracking terminal errors, labelled by `type`.
pub const ERRORS_TOTAL: &str = "streamwire_errors_total";

/// Record a dispatched record of `kind` (`data` or `control`).
pub fn inc_records(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(RECORDS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a received body chunk.
pub fn inc_chunks() {
    #[cfg(feature = "metrics")]
    counter!(CHUNKS_TOTAL).increment(1);
}

/// Record a scheduled retry in `domain`.
pub fn inc_retries(domain: RecoveryDomain) {
    #[cfg(feature = "metrics")]
    counter!(RETRIES_TOTAL, "domain" => domain.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = domain;
}

/// Record a terminal error of `error_type`.
pub fn inc_errors(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = error_type;
}
