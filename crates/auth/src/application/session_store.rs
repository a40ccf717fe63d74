//! Session Store
//!
//! The single mutable shared resource: the in-memory Session plus its
//! durable advisory snapshot. Reads are free for everyone; the mutators are
//! `pub(crate)` so only the state machine can reach them - the single-writer
//! invariant is enforced by visibility, not convention.

use std::sync::{Arc, RwLock};

use crate::domain::entity::session::{CachedSnapshot, Session};
use crate::domain::gateway::SnapshotStore;

/// Holder of the current session and its durable snapshot
#[derive(Debug)]
pub struct SessionStore<S> {
    snapshots: Arc<S>,
    current: RwLock<Option<Arc<Session>>>,
}

impl<S> SessionStore<S>
where
    S: SnapshotStore + Sync,
{
    pub fn new(snapshots: Arc<S>) -> Self {
        Self {
            snapshots,
            current: RwLock::new(None),
        }
    }

    /// Current session, if any. Lock-free for callers beyond a short read
    /// lock; safe at any call frequency.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().expect("session lock poisoned").clone()
    }

    /// Advisory pre-render hint from durable storage. Never fresh, never
    /// proof of authentication.
    pub async fn cached_hint(&self) -> Option<Session> {
        match self.snapshots.load().await {
            Ok(Some(snapshot)) => Some(snapshot.session),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read cached session snapshot");
                None
            }
        }
    }

    /// Replace the in-memory session. Only the state machine calls this.
    pub(crate) fn replace(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().expect("session lock poisoned") = Some(Arc::clone(&session));
        session
    }

    /// Persist the snapshot for the given session. Best-effort: a failed
    /// write is logged and the in-memory session stands.
    pub(crate) async fn persist(&self, session: &Session) {
        let snapshot = CachedSnapshot::of(session);
        if let Err(err) = self.snapshots.store(&snapshot).await {
            tracing::warn!(error = %err, "Failed to persist session snapshot");
        }
    }

    /// Clear both the in-memory session and the durable snapshot. The
    /// in-memory clear is unconditional; a failed snapshot delete is logged
    /// and retried once.
    pub(crate) async fn clear(&self) {
        *self.current.write().expect("session lock poisoned") = None;

        if let Err(err) = self.snapshots.clear().await {
            tracing::warn!(error = %err, "Failed to delete session snapshot, retrying");
            if let Err(err) = self.snapshots.clear().await {
                tracing::error!(error = %err, "Session snapshot survives sign-out");
            }
        }
    }
}
