//! The recovery decision engine.

use std::{fmt, time::Duration};

use tokio::time::sleep;

use super::{RecoveryConfig, RecoveryCounters, RecoveryDomain};
use crate::{
    disconnect::{DisconnectCategory, DisconnectSignal},
    error::{DisconnectFailure, FailureContext, HttpStatusError, StreamError},
    transport::{TransportError, TransportErrorKind},
};

/// Lifecycle of a streaming session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No request has started.
    #[default]
    Idle,
    /// A connection attempt is in flight and no header has arrived.
    Connecting,
    /// Headers arrived; records may be flowing.
    Streaming,
    /// Waiting out a back-off before the next attempt.
    Recovering,
    /// The request ended.
    Terminated(TerminalKind),
}

/// How a terminated session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalKind {
    /// Graceful end.
    Success,
    /// Fatal error.
    Fatal,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Recovering => "recovering",
            Self::Terminated(TerminalKind::Success) => "terminated",
            Self::Terminated(TerminalKind::Fatal) => "failed",
        })
    }
}

/// Why a session ended without error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The server ended the body cleanly.
    EndOfStream,
    /// The caller requested an abort with a local code.
    Cancelled(DisconnectSignal),
}

/// A scheduled retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPlan {
    /// Domain charged for the retry.
    pub domain: RecoveryDomain,
    /// Retry number within the domain, starting at one.
    pub attempt: u32,
    /// Back-off before reconnecting.
    pub delay: Duration,
    /// What failed.
    pub cause: String,
}

impl RetryPlan {
    /// Sleep for the planned delay.
    pub async fn wait(&self) { sleep(self.delay).await; }
}

/// Decision for a finished attempt.
#[derive(Debug)]
pub enum Outcome {
    /// Back off and reconnect.
    Retry(RetryPlan),
    /// Stop with an error.
    Fatal(StreamError),
    /// Stop gracefully.
    Success(Termination),
}

/// Turns attempt results into [`Outcome`]s and owns the retry counters.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::{
///     error::FailureContext,
///     recovery::{Outcome, RecoveryConfig, RecoveryMachine},
///     transport::{TransportError, TransportErrorKind},
/// };
///
/// let mut machine = RecoveryMachine::new(RecoveryConfig::default());
/// machine.begin_attempt();
/// let outcome = machine.on_transport_error(
///     TransportError::new(TransportErrorKind::PartialTransfer, "cut"),
///     None,
///     FailureContext::default(),
/// );
/// let Outcome::Retry(plan) = outcome else { panic!("expected retry") };
/// assert_eq!(plan.delay, Duration::from_millis(250));
/// assert_eq!(machine.counters().transport, 1);
/// ```
#[derive(Debug)]
pub struct RecoveryMachine {
    config: RecoveryConfig,
    counters: RecoveryCounters,
    state: SessionState,
}

impl RecoveryMachine {
    /// Create a machine with fresh counters.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            counters: RecoveryCounters::default(),
            state: SessionState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &SessionState { &self.state }

    /// Current retry counters.
    #[must_use]
    pub fn counters(&self) -> RecoveryCounters { self.counters }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig { &self.config }

    /// A connection attempt is starting.
    pub fn begin_attempt(&mut self) { self.state = SessionState::Connecting; }

    /// The first header line of the attempt arrived.
    ///
    /// Resets the transport counter, and the HTTP counter too when the
    /// provisional status is below 300.
    pub fn on_first_header(&mut self, provisional_status: Option<u16>) {
        self.counters.reset_transport();
        if provisional_status.is_some_and(|status| status < 300) {
            self.counters.reset_http();
        }
        self.state = SessionState::Streaming;
    }

    /// A record reached the caller.
    pub fn on_record_delivered(&mut self) { self.counters.reset_reconnect(); }

    /// The transport failed. `signal` is the disconnect pending when it did.
    pub fn on_transport_error(
        &mut self,
        error: TransportError,
        signal: Option<DisconnectSignal>,
        context: FailureContext,
    ) -> Outcome {
        match (error.kind(), signal) {
            (_, Some(signal)) if signal.code.is_local() => self.on_disconnect(signal, context),
            (TransportErrorKind::WriteAborted, Some(signal)) => self.on_disconnect(signal, context),
            (kind, _) if kind.is_transient() => {
                let cause = error.to_string();
                self.retry_or(RecoveryDomain::Transport, cause, || StreamError::Transport {
                    source: error,
                    context,
                })
            }
            _ => self.fatal(StreamError::Transport {
                source: error,
                context,
            }),
        }
    }

    /// Resolve a disconnect signal by its code.
    pub fn on_disconnect(&mut self, signal: DisconnectSignal, context: FailureContext) -> Outcome {
        let failure = match signal.category() {
            DisconnectCategory::Local => {
                return self.succeed(Termination::Cancelled(signal));
            }
            DisconnectCategory::Transient => {
                let cause = signal.to_string();
                return self.retry_or(RecoveryDomain::Transport, cause, || {
                    StreamError::Disconnect {
                        signal,
                        failure: DisconnectFailure::RetriesExhausted,
                        context,
                    }
                });
            }
            DisconnectCategory::Fatal => DisconnectFailure::Fatal,
            DisconnectCategory::Unhandled => DisconnectFailure::Unhandled,
        };
        self.fatal(StreamError::Disconnect {
            signal,
            failure,
            context,
        })
    }

    /// The attempt completed with a final status of 300 or above.
    pub fn on_http_status(&mut self, error: HttpStatusError, context: FailureContext) -> Outcome {
        if !error.is_server_busy() {
            return self.fatal(StreamError::HttpStatus {
                source: error,
                context,
            });
        }
        let cause = error.to_string();
        self.retry_or(RecoveryDomain::Http, cause, || StreamError::HttpStatus {
            source: error,
            context,
        })
    }

    /// The server accepted the connection, announced `Connection: close`, and
    /// ended it without sending a record.
    pub fn on_server_close(&mut self, context: FailureContext) -> Outcome {
        let attempts = self.counters.reconnect.saturating_add(1);
        self.retry_or(
            RecoveryDomain::Reconnect,
            "connection closed by server".to_owned(),
            || StreamError::ConnectionClosed { attempts, context },
        )
    }

    /// The attempt completed normally.
    pub fn on_end_of_stream(&mut self) -> Outcome { self.succeed(Termination::EndOfStream) }

    /// A failure that no retry can fix, such as unframed input.
    pub fn fatal(&mut self, error: StreamError) -> Outcome {
        self.state = SessionState::Terminated(TerminalKind::Fatal);
        Outcome::Fatal(error)
    }

    fn succeed(&mut self, termination: Termination) -> Outcome {
        self.state = SessionState::Terminated(TerminalKind::Success);
        Outcome::Success(termination)
    }

    fn retry_or(
        &mut self,
        domain: RecoveryDomain,
        cause: String,
        fatal: impl FnOnce() -> StreamError,
    ) -> Outcome {
        match self.plan_retry(domain, cause) {
            Some(plan) => {
                self.state = SessionState::Recovering;
                Outcome::Retry(plan)
            }
            None => self.fatal(fatal()),
        }
    }

    fn plan_retry(&mut self, domain: RecoveryDomain, cause: String) -> Option<RetryPlan> {
        if !self.config.retries_enabled {
            return None;
        }
        let policy = *self.config.policy(domain);
        let spent = self.counters.get(domain);
        if spent >= policy.max_retries {
            return None;
        }
        let delay = policy.backoff.delay(spent + 1)?;
        let attempt = self.counters.bump(domain);
        Some(RetryPlan {
            domain,
            attempt,
            delay,
            cause,
        })
    }
}
