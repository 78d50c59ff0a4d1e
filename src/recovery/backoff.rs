//! Retry delays.

use std::time::Duration;

use tokio::time::sleep;

/// How the delay grows with the attempt number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Growth {
    /// `initial × attempt`.
    Linear,
    /// `initial × 2^attempt`.
    Exponential,
}

/// Delay schedule for one failure domain.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::recovery::BackoffPolicy;
///
/// let http = BackoffPolicy::exponential(Duration::from_secs(5), Duration::from_secs(320), 5);
/// assert_eq!(http.delay(2), Some(Duration::from_secs(20)));
/// assert_eq!(http.delay(7), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Base delay.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub maximum: Duration,
    /// Attempts after which the schedule gives up.
    pub tries_max: u32,
    /// Growth curve.
    pub growth: Growth,
}

impl BackoffPolicy {
    /// Linear schedule.
    #[must_use]
    pub const fn linear(initial: Duration, maximum: Duration, tries_max: u32) -> Self {
        Self {
            initial,
            maximum,
            tries_max,
            growth: Growth::Linear,
        }
    }

    /// Exponential schedule.
    #[must_use]
    pub const fn exponential(initial: Duration, maximum: Duration, tries_max: u32) -> Self {
        Self {
            initial,
            maximum,
            tries_max,
            growth: Growth::Exponential,
        }
    }

    /// Ensure `initial <= maximum`, swapping inverted values.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.initial > self.maximum {
            std::mem::swap(&mut self.initial, &mut self.maximum);
        }
        self
    }

    /// Delay before retry number `attempt`, or `None` once `attempt`
    /// exceeds `tries_max`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.tries_max {
            return None;
        }
        let raw = match self.growth {
            Growth::Linear => self.initial.saturating_mul(attempt),
            Growth::Exponential => self.initial.saturating_mul(2_u32.saturating_pow(attempt)),
        };
        Some(raw.min(self.maximum))
    }

    /// Sleep for [`delay`](Self::delay) and return it, or return `None`
    /// immediately when the schedule has given up.
    pub async fn wait(&self, attempt: u32) -> Option<Duration> {
        let delay = self.delay(attempt)?;
        sleep(delay).await;
        Some(delay)
    }
}

/// Free-standing form of [`BackoffPolicy::wait`].
///
/// Blocks the calling task for the computed delay and returns it, or returns
/// `None` without waiting when `attempt > tries_max`.
pub async fn wait_seconds(
    attempt: u32,
    initial: Duration,
    maximum: Duration,
    tries_max: u32,
    growth: Growth,
) -> Option<Duration> {
    BackoffPolicy {
        initial,
        maximum,
        tries_max,
        growth,
    }
    .wait(attempt)
    .await
}
