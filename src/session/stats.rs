//! Live counters and their snapshots.

use std::{
    fmt,
    sync::{
        Mutex,
        PoisonError,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;

use crate::record::Record;

/// Counters updated by the engine and read through the handle.
///
/// Chunk, record and byte counts and the elapsed timer restart with every
/// connection attempt; attempt and retry counts cover the whole request.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    chunks: AtomicU64,
    bytes: AtomicU64,
    records: AtomicU64,
    data: AtomicU64,
    control: AtomicU64,
    keep_alives: AtomicU64,
    attempts: AtomicU32,
    retries: AtomicU32,
    started: Mutex<Option<Instant>>,
}

impl StatsCounters {
    pub(crate) fn begin_request(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
    }

    pub(crate) fn begin_attempt(&self) {
        for counter in [
            &self.chunks,
            &self.bytes,
            &self.records,
            &self.data,
            &self.control,
            &self.keep_alives,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.attempts.fetch_add(1, Ordering::Relaxed);
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    pub(crate) fn chunk(&self, len: usize) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes
            .fetch_add(u64::try_from(len).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Count a dispatched record and return the attempt's record total.
    pub(crate) fn record(&self, record: &Record) -> u64 {
        let by_kind = match record {
            Record::Data(_) => &self.data,
            Record::Control(_) => &self.control,
        };
        by_kind.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn keep_alives(&self, count: u64) {
        self.keep_alives.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn retry(&self) { self.retries.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn snapshot(&self, name: &str) -> StreamStats {
        let started = *self.started.lock().unwrap_or_else(PoisonError::into_inner);
        StreamStats {
            name: name.to_owned(),
            elapsed: started.map_or(Duration::ZERO, |at| at.elapsed()),
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            data: self.data.load(Ordering::Relaxed),
            control: self.control.load(Ordering::Relaxed),
            keep_alives: self.keep_alives.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics for a session.
///
/// `Display` renders a table row:
/// `|name|DHMS|chunks|records|records/s|data|control|`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::session::StreamStats;
///
/// let stats = StreamStats {
///     name: "filter".into(),
///     elapsed: Duration::from_secs(90_061),
///     records: 10,
///     data: 9,
///     control: 1,
///     ..StreamStats::default()
/// };
/// assert_eq!(stats.to_string(), "|filter|001-01:01:01|0|10|0.00|9|1|");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamStats {
    /// Session name.
    pub name: String,
    /// Time since the current attempt connected.
    pub elapsed: Duration,
    /// Body chunks in the current attempt.
    pub chunks: u64,
    /// Body bytes in the current attempt.
    pub bytes: u64,
    /// Records dispatched in the current attempt.
    pub records: u64,
    /// Data records dispatched in the current attempt.
    pub data: u64,
    /// Control messages dispatched in the current attempt.
    pub control: u64,
    /// Keep-alives received in the current attempt.
    pub keep_alives: u64,
    /// Connection attempts for the current request.
    pub attempts: u32,
    /// Retries scheduled for the current request.
    pub retries: u32,
}

impl StreamStats {
    /// Average dispatch rate over the current attempt.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "rates are informational and tolerate rounding"
    )]
    pub fn records_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.records as f64 / secs
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "|{}|{}|{}|{}|{:.2}|{}|{}|",
            self.name,
            format_dhms(self.elapsed),
            self.chunks,
            self.records,
            self.records_per_second(),
            self.data,
            self.control
        )
    }
}

/// Render a duration as `DDD-HH:MM:SS`.
#[must_use]
pub fn format_dhms(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;
    format!("{days:03}-{hours:02}:{minutes:02}:{seconds:02}")
}
