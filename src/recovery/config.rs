//! Retry budgets per failure domain.

use std::{fmt, time::Duration};

use super::BackoffPolicy;

/// Independent failure domains, each with its own counter and budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecoveryDomain {
    /// Network-level failures: partial transfers, timeouts, shed load.
    Transport,
    /// Server busy statuses.
    Http,
    /// Accepted connections closed before any data.
    Reconnect,
}

impl RecoveryDomain {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Http => "http",
            Self::Reconnect => "reconnect",
        }
    }
}

impl fmt::Display for RecoveryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Budget and schedule for one domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainPolicy {
    /// Retries allowed before the failure becomes fatal.
    pub max_retries: u32,
    /// Delay schedule.
    pub backoff: BackoffPolicy,
}

impl DomainPolicy {
    /// Build a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// Recovery settings for a session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::recovery::{BackoffPolicy, DomainPolicy, RecoveryConfig};
///
/// let config = RecoveryConfig::default().http(DomainPolicy::new(
///     2,
///     BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(8), 5),
/// ));
/// assert_eq!(config.http.max_retries, 2);
/// assert_eq!(config.transport.max_retries, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Transport domain.
    ///
    /// Default: 4 retries, linear 250 ms steps capped at 16 s.
    pub transport: DomainPolicy,

    /// HTTP status domain.
    ///
    /// Default: 4 retries, exponential from 5 s capped at 320 s.
    pub http: DomainPolicy,

    /// Reconnect loop domain.
    ///
    /// Default: 3 retries, linear 10 s steps capped at 60 s.
    pub reconnect: DomainPolicy,

    /// Master switch; when off every failure except cancellation is fatal.
    ///
    /// Default: true.
    pub retries_enabled: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            transport: DomainPolicy::new(
                4,
                BackoffPolicy::linear(Duration::from_millis(250), Duration::from_secs(16), 5),
            ),
            http: DomainPolicy::new(
                4,
                BackoffPolicy::exponential(Duration::from_secs(5), Duration::from_secs(320), 5),
            ),
            reconnect: DomainPolicy::new(
                3,
                BackoffPolicy::linear(Duration::from_secs(10), Duration::from_secs(60), 3),
            ),
            retries_enabled: true,
        }
    }
}

impl RecoveryConfig {
    /// Set the transport policy.
    #[must_use]
    pub fn transport(mut self, policy: DomainPolicy) -> Self {
        self.transport = normalized(policy);
        self
    }

    /// Set the HTTP status policy.
    #[must_use]
    pub fn http(mut self, policy: DomainPolicy) -> Self {
        self.http = normalized(policy);
        self
    }

    /// Set the reconnect loop policy.
    #[must_use]
    pub fn reconnect(mut self, policy: DomainPolicy) -> Self {
        self.reconnect = normalized(policy);
        self
    }

    /// Enable or disable all retries.
    #[must_use]
    pub fn retries(mut self, enabled: bool) -> Self {
        self.retries_enabled = enabled;
        self
    }

    /// Policy for `domain`.
    #[must_use]
    pub fn policy(&self, domain: RecoveryDomain) -> &DomainPolicy {
        match domain {
            RecoveryDomain::Transport => &self.transport,
            RecoveryDomain::Http => &self.http,
            RecoveryDomain::Reconnect => &self.reconnect,
        }
    }
}

fn normalized(mut policy: DomainPolicy) -> DomainPolicy {
    policy.backoff = policy.backoff.normalized();
    policy
}
