//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use streamwire::{
    error::StreamError,
    record::Record,
    recovery::Termination,
    session::StreamClient,
    transport::{StreamRequest, Transport},
};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Body bytes for `records`, each followed by CRLF.
pub fn crlf_records(records: &[&str]) -> String {
    records.iter().map(|record| format!("{record}\r\n")).collect()
}

/// Run `request` to completion, collecting every dispatched record.
pub async fn collect<T: Transport>(
    client: &mut StreamClient<T>,
    request: StreamRequest,
) -> (Result<Termination, StreamError>, Vec<Record>) {
    let mut records = Vec::new();
    let result = client
        .open_stream(request, |record| records.push(record))
        .await;
    (result, records)
}
