//! Registry of live stream sessions.
//!
//! `SessionRegistry` holds weak references to [`StreamHandle`]s so an
//! application running one session per identity can enumerate, inspect and
//! abort them without keeping finished sessions alive. Dead entries are
//! pruned lazily on lookup or explicitly with [`SessionRegistry::prune`].
use std::{fmt, sync::Weak};

use dashmap::DashMap;

use crate::{
    disconnect::DisconnectCode,
    session::{SessionShared, StreamHandle},
};

/// Identifier assigned to a session by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl From<u64> for SessionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl SessionId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// The raw identifier.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "session-{}", self.0) }
}

/// Concurrent map of session handles keyed by [`SessionId`].
///
/// # Examples
///
/// ```
/// use streamwire::{
///     registry::{SessionId, SessionRegistry},
///     session::StreamClient,
/// };
/// use streamwire_testing::ScriptedTransport;
///
/// let registry = SessionRegistry::default();
/// let client = StreamClient::builder().build(ScriptedTransport::default());
/// let id = SessionId::new(7);
/// registry.insert(id, &client.handle());
/// assert!(registry.get(&id).is_some());
///
/// drop(client);
/// assert!(registry.get(&id).is_none());
/// ```
#[derive(Default)]
pub struct SessionRegistry(DashMap<SessionId, Weak<SessionShared>>);

impl SessionRegistry {
    /// Handle for `id` if its session is still alive.
    pub fn get(&self, id: &SessionId) -> Option<StreamHandle> {
        let guard = self.0.get(id);
        let shared = guard.as_ref().and_then(|weak| weak.upgrade());
        drop(guard);
        if shared.is_none() {
            self.0.remove_if(id, |_, weak| weak.strong_count() == 0);
        }
        shared.map(StreamHandle::from_arc)
    }

    /// Track `handle` under `id`, replacing any previous entry.
    pub fn insert(&self, id: SessionId, handle: &StreamHandle) {
        self.0.insert(id, handle.downgrade());
    }

    /// Stop tracking `id`.
    pub fn remove(&self, id: &SessionId) { self.0.remove(id); }

    /// Drop entries whose sessions have gone away.
    ///
    /// `DashMap::retain` takes per-shard write locks, so concurrent lookups
    /// may wait briefly.
    pub fn prune(&self) { self.0.retain(|_, weak| weak.strong_count() > 0); }

    /// Prune dead entries, then collect the live handles.
    #[must_use]
    pub fn active_handles(&self) -> Vec<(SessionId, StreamHandle)> {
        let mut handles = Vec::with_capacity(self.0.len());
        self.0.retain(|id, weak| {
            if let Some(shared) = weak.upgrade() {
                handles.push((*id, StreamHandle::from_arc(shared)));
                true
            } else {
                false
            }
        });
        handles
    }

    /// Prune dead entries, then return the IDs of the live sessions.
    #[must_use]
    pub fn active_ids(&self) -> Vec<SessionId> {
        let mut ids = Vec::with_capacity(self.0.len());
        self.0.retain(|id, weak| {
            if weak.strong_count() > 0 {
                ids.push(*id);
                true
            } else {
                false
            }
        });
        ids
    }

    /// Request an abort on every live session and return how many were
    /// signalled.
    pub fn abort_all(&self, code: impl Into<DisconnectCode>, reason: &str) -> usize {
        let code = code.into();
        let handles = self.active_handles();
        for (id, handle) in &handles {
            log::info!("aborting {id} ({}) with code {code}", handle.name());
            handle.request_abort(code, reason);
        }
        handles.len()
    }

    /// Number of tracked entries, including any not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn registry() -> SessionRegistry { SessionRegistry::default() }

    fn handle(name: &str) -> StreamHandle { StreamHandle::new(name.to_owned()) }

    #[rstest]
    fn live_handle_is_returned(registry: SessionRegistry) {
        let live = handle("filter");
        registry.insert(SessionId::new(1), &live);

        let found = registry
            .get(&SessionId::new(1))
            .expect("handle should be present");
        assert_eq!(found.name(), "filter");
    }

    #[rstest]
    fn lookup_prunes_dropped_session(registry: SessionRegistry) {
        let id = SessionId::new(2);
        registry.insert(id, &handle("gone"));

        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[rstest]
    fn active_ids_skip_dead_entries(registry: SessionRegistry) {
        let live = handle("live");
        registry.insert(SessionId::new(1), &live);
        registry.insert(SessionId::new(2), &handle("dead"));

        assert_eq!(registry.active_ids(), vec![SessionId::new(1)]);
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn prune_and_remove(registry: SessionRegistry) {
        let live = handle("live");
        registry.insert(SessionId::new(1), &live);
        registry.insert(SessionId::new(2), &handle("dead"));
        registry.prune();
        assert_eq!(registry.len(), 1);

        registry.remove(&SessionId::new(1));
        assert!(registry.is_empty());
    }

    #[rstest]
    fn abort_all_signals_every_live_session(registry: SessionRegistry) {
        let first = handle("a");
        let second = handle("b");
        registry.insert(SessionId::new(1), &first);
        registry.insert(SessionId::new(2), &second);
        registry.insert(SessionId::new(3), &handle("dead"));

        assert_eq!(registry.abort_all(1001_u16, "shutdown"), 2);
        assert!(first.abort_pending());
        assert!(second.abort_pending());
    }

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(SessionId::from(9).to_string(), "session-9");
    }
}
