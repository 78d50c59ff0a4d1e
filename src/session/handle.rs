//! Cloneable view of a running session.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{StreamStats, stats::StatsCounters};
use crate::{
    disconnect::{DisconnectCode, DisconnectSignal},
    recovery::SessionState,
};

/// State shared between the engine and its handles.
#[derive(Debug)]
pub(crate) struct SessionShared {
    name: String,
    abort: Mutex<Option<DisconnectSignal>>,
    state: Mutex<SessionState>,
    pub(crate) stats: StatsCounters,
}

impl SessionShared {
    fn new(name: String) -> Self {
        Self {
            name,
            abort: Mutex::new(None),
            state: Mutex::new(SessionState::Idle),
            stats: StatsCounters::default(),
        }
    }

    pub(crate) fn name(&self) -> &str { &self.name }

    pub(crate) fn abort_pending(&self) -> bool {
        self.abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Consume the pending signal; each signal is acted on once.
    pub(crate) fn take_abort(&self) -> Option<DisconnectSignal> {
        self.abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn set_abort(&self, signal: DisconnectSignal) {
        *self.abort.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle for observing and cancelling a session from other tasks.
///
/// # Examples
///
/// ```
/// use streamwire::{recovery::SessionState, session::StreamClient};
///
/// let client = StreamClient::builder()
///     .name("filter")
///     .build(streamwire_testing::ScriptedTransport::default());
/// let handle = client.handle();
/// assert_eq!(handle.state(), SessionState::Idle);
/// handle.request_abort(1001_u16, "shutting down");
/// assert!(handle.abort_pending());
/// ```
#[derive(Clone, Debug)]
pub struct StreamHandle(Arc<SessionShared>);

impl StreamHandle {
    pub(crate) fn new(name: String) -> Self { Self(Arc::new(SessionShared::new(name))) }

    pub(crate) fn from_arc(arc: Arc<SessionShared>) -> Self { Self(arc) }

    /// Downgrade to a `Weak` reference for storage in a registry.
    pub(crate) fn downgrade(&self) -> Weak<SessionShared> { Arc::downgrade(&self.0) }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> { &self.0 }

    /// Session name used in logs and statistics.
    #[must_use]
    pub fn name(&self) -> &str { self.0.name() }

    /// Ask the session to stop.
    ///
    /// Codes of 1000 and above end the stream gracefully with
    /// [`Termination::Cancelled`](crate::recovery::Termination::Cancelled).
    /// Lower codes are treated as if the server had sent them. The engine
    /// notices the request on its next header or data callback, or before
    /// its next connection attempt; a request made while no stream is open
    /// applies to the next one. A later request replaces a pending one.
    pub fn request_abort(&self, code: impl Into<DisconnectCode>, reason: impl Into<String>) {
        self.0.set_abort(DisconnectSignal::new(code, reason));
    }

    /// Whether an abort is waiting to be acted on.
    #[must_use]
    pub fn abort_pending(&self) -> bool { self.0.abort_pending() }

    /// Snapshot of the session's counters.
    #[must_use]
    pub fn stats(&self) -> StreamStats { self.0.stats.snapshot(self.0.name()) }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.0.state() }
}
