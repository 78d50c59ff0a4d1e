//! Response sink for one connection attempt.

use bytes::{Bytes, BytesMut};

use super::handle::SessionShared;
use crate::{
    disconnect::DisconnectSignal,
    error::{FailureContext, StreamError},
    frame::{FrameReassembler, FramingError},
    metrics,
    record::{Record, RecordClassifier, RecordError},
    recovery::RecoveryMachine,
    transport::{Flow, ResponseSink},
};

/// Cap on the error body kept for diagnostics.
pub const MAX_ERROR_BODY: usize = 64 * 1024;

/// Local failure detected while consuming the body.
#[derive(Debug)]
pub(crate) enum AttemptFailure {
    Framing(FramingError),
    Malformed(RecordError),
}

impl AttemptFailure {
    pub(crate) fn into_error(self, context: FailureContext) -> StreamError {
        match self {
            Self::Framing(source) => StreamError::Framing { source, context },
            Self::Malformed(source) => StreamError::MalformedRecords { source, context },
        }
    }
}

/// What the sink observed during the attempt.
#[derive(Debug, Default)]
pub(crate) struct AttemptReport {
    pub(crate) provisional_status: Option<u16>,
    pub(crate) close_signalled: bool,
    pub(crate) error_body: Bytes,
    pub(crate) remote_signal: Option<DisconnectSignal>,
    pub(crate) failure: Option<AttemptFailure>,
    pub(crate) delivered: u64,
}

/// Frames, classifies and dispatches the body of one attempt.
pub(crate) struct AttemptSink<'a, F> {
    reassembler: &'a mut FrameReassembler,
    classifier: &'a RecordClassifier,
    machine: &'a mut RecoveryMachine,
    shared: &'a SessionShared,
    on_record: &'a mut F,
    stats_every: u64,
    header_lines: u32,
    keep_alives_seen: u64,
    malformed_run: u32,
    report: AttemptReport,
    error_body: BytesMut,
}

impl<'a, F> AttemptSink<'a, F>
where
    F: FnMut(Record) + Send,
{
    pub(crate) fn new(
        reassembler: &'a mut FrameReassembler,
        classifier: &'a RecordClassifier,
        machine: &'a mut RecoveryMachine,
        shared: &'a SessionShared,
        on_record: &'a mut F,
        stats_every: u64,
    ) -> Self {
        let keep_alives_seen = reassembler.keep_alives();
        Self {
            reassembler,
            classifier,
            machine,
            shared,
            on_record,
            stats_every,
            header_lines: 0,
            keep_alives_seen,
            malformed_run: 0,
            report: AttemptReport::default(),
            error_body: BytesMut::new(),
        }
    }

    pub(crate) fn finish(mut self) -> AttemptReport {
        self.report.error_body = self.error_body.freeze();
        self.report
    }

    fn flow(&self) -> Flow {
        if self.report.failure.is_some()
            || self.report.remote_signal.is_some()
            || self.shared.abort_pending()
        {
            Flow::Abort
        } else {
            Flow::Continue
        }
    }

    fn collecting_error_body(&self) -> bool {
        self.report
            .provisional_status
            .is_some_and(|status| status >= 300)
    }

    fn collect_error_body(&mut self, chunk: &[u8]) {
        let room = MAX_ERROR_BODY.saturating_sub(self.error_body.len());
        self.error_body
            .extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn framing_failed(&mut self, err: FramingError) {
        log::warn!("{} framing failed: {err}", self.shared.name());
        self.report.failure = Some(AttemptFailure::Framing(err));
    }

    fn dispatch(&mut self, frame: &[u8]) {
        let record = match self.classifier.classify(frame) {
            Ok(record) => record,
            Err(err) => {
                self.malformed_run += 1;
                log::warn!(
                    "{} dropped malformed record ({} in a row): {err}",
                    self.shared.name(),
                    self.malformed_run
                );
                if self.malformed_run > self.classifier.config().max_consecutive_malformed {
                    self.report.failure = Some(AttemptFailure::Malformed(err));
                }
                return;
            }
        };
        self.malformed_run = 0;
        if let Some(control) = record.as_control() {
            tracing::debug!(kind = %control.kind(), "control message");
            if let Some(limit) = control.limit() {
                log::warn!(
                    "{} limit notice: {} undelivered matches",
                    self.shared.name(),
                    limit.track
                );
            }
            if let Some(warning) = control.warning() {
                log::warn!(
                    "{} stall warning {}: {}",
                    self.shared.name(),
                    warning.code,
                    warning.message
                );
            }
            if let Some(signal) = control.disconnect() {
                tracing::info!(%signal, "server requested disconnect");
                self.report.remote_signal = Some(signal.clone());
            }
        }

        let total = self.shared.stats.record(&record);
        metrics::inc_records(record.kind_label());
        self.machine.on_record_delivered();
        self.report.delivered += 1;
        (self.on_record)(record);

        if self.stats_every > 0 && total % self.stats_every == 0 {
            log::info!("{}", self.shared.stats.snapshot(self.shared.name()));
        }
    }
}

impl<F> ResponseSink for AttemptSink<'_, F>
where
    F: FnMut(Record) + Send,
{
    fn on_header(&mut self, line: &str) -> Flow {
        self.header_lines += 1;
        if self.header_lines == 1 {
            let status = parse_status_line(line);
            tracing::debug!(status, "response status");
            self.report.provisional_status = status;
            self.machine.on_first_header(status);
            self.shared.set_state(self.machine.state().clone());
        } else if is_connection_close(line) {
            self.report.close_signalled = true;
        }
        self.flow()
    }

    fn on_data(&mut self, chunk: &[u8]) -> Flow {
        self.shared.stats.chunk(chunk.len());
        metrics::inc_chunks();
        if self.collecting_error_body() {
            self.collect_error_body(chunk);
            return self.flow();
        }

        match self.reassembler.feed(chunk) {
            Ok(frames) => {
                for frame in frames {
                    self.dispatch(&frame);
                    if self.report.failure.is_some() {
                        break;
                    }
                }
                if self.report.failure.is_none()
                    && let Some(err) = self.reassembler.take_error()
                {
                    self.framing_failed(err);
                }
            }
            Err(err) => self.framing_failed(err),
        }

        let keep_alives = self.reassembler.keep_alives();
        self.shared
            .stats
            .keep_alives(keep_alives - self.keep_alives_seen);
        self.keep_alives_seen = keep_alives;
        self.flow()
    }
}

/// Status code from a line such as `HTTP/1.1 200 OK`.
pub(crate) fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

fn is_connection_close(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, value)| {
        name.trim().eq_ignore_ascii_case("connection") && value.trim().eq_ignore_ascii_case("close")
    })
}
