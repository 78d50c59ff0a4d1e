//! Failure classification and retry scheduling.
//!
//! Failures fall into three independent domains, each with its own counter,
//! budget and back-off schedule:
//!
//! - transport: partial transfers, low-speed timeouts and transient server
//!   disconnects, retried with linear back-off;
//! - HTTP: busy statuses (500, 502, 503, 504), retried with exponential
//!   back-off;
//! - reconnect: connections the server accepts and closes without data.
//!
//! [`RecoveryMachine`] turns each attempt result into an [`Outcome`]. It
//! never sleeps itself; the session waits on the returned [`RetryPlan`].

mod backoff;
mod config;
mod counters;
mod machine;

pub use backoff::{BackoffPolicy, Growth, wait_seconds};
pub use config::{DomainPolicy, RecoveryConfig, RecoveryDomain};
pub use counters::RecoveryCounters;
pub use machine::{
    Outcome,
    RecoveryMachine,
    RetryPlan,
    SessionState,
    TerminalKind,
    Termination,
};
