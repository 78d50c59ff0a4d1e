//! Minimum transfer rate enforcement.

use std::time::Duration;

use tokio::time::Instant;

use super::{TransportError, TransportErrorKind};

/// Fail the request when the average rate over `window` drops below
/// `bytes_per_second`.
///
/// Keep-alives count as traffic, so a healthy but idle stream stays above
/// any limit lower than its keep-alive rate.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::transport::LowSpeedLimit;
///
/// let limit = LowSpeedLimit::new(1, Duration::from_secs(90));
/// assert_eq!(limit.required_bytes(), 90);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowSpeedLimit {
    /// Minimum average rate.
    pub bytes_per_second: u64,
    /// Measurement window; clamped to at least one second.
    pub window: Duration,
}

impl LowSpeedLimit {
    /// Build a limit.
    #[must_use]
    pub fn new(bytes_per_second: u64, window: Duration) -> Self {
        Self {
            bytes_per_second,
            window: window.max(Duration::from_secs(1)),
        }
    }

    /// Bytes that must arrive within one window.
    #[must_use]
    pub fn required_bytes(&self) -> u64 {
        let millis = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        self.bytes_per_second.saturating_mul(millis) / 1000
    }
}

/// Tracks traffic against a [`LowSpeedLimit`] in fixed windows.
#[derive(Debug)]
pub(crate) struct LowSpeedWatchdog {
    limit: Option<LowSpeedLimit>,
    window_start: Instant,
    bytes: u64,
}

impl LowSpeedWatchdog {
    pub(crate) fn new(limit: Option<LowSpeedLimit>) -> Self {
        Self {
            limit,
            window_start: Instant::now(),
            bytes: 0,
        }
    }

    /// End of the current window, or `None` when no limit applies.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.limit.map(|limit| self.window_start + limit.window)
    }

    /// Account for `len` received bytes.
    pub(crate) fn record(&mut self, len: usize) -> Result<(), TransportError> {
        self.bytes = self
            .bytes
            .saturating_add(u64::try_from(len).unwrap_or(u64::MAX));
        self.check(Instant::now())
    }

    /// Close the window if it has elapsed and fail when too little arrived.
    pub(crate) fn check(&mut self, now: Instant) -> Result<(), TransportError> {
        let (Some(limit), Some(deadline)) = (self.limit, self.deadline()) else {
            return Ok(());
        };
        if now < deadline {
            return Ok(());
        }
        if self.bytes < limit.required_bytes() {
            return Err(TransportError::new(
                TransportErrorKind::TimedOut,
                format!(
                    "operation too slow: {} bytes in {:?}, need {} bytes/s",
                    self.bytes, limit.window, limit.bytes_per_second
                ),
            ));
        }
        self.window_start = now;
        self.bytes = 0;
        Ok(())
    }
}
