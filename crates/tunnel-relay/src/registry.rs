//! Code to session registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::RelaySession;

/// Rendezvous point mapping codes to relay sessions.
///
/// Uses `parking_lot::RwLock`, so concurrent lookups never block each other
/// and no guard is held across an await point.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RelaySession>>>,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `session` under its code, returning the session it replaced.
    ///
    /// A replaced session keeps running until its connections end, but it is
    /// no longer reachable by new clients.
    pub fn register(&self, session: Arc<RelaySession>) -> Option<Arc<RelaySession>> {
        self.sessions
            .write()
            .insert(session.code().to_string(), session)
    }

    /// Cancellation token for a new session, cancelled by [`shutdown`].
    ///
    /// Sessions built with it stop on shutdown even after they have been
    /// replaced in the map.
    ///
    /// [`shutdown`]: SessionRegistry::shutdown
    pub fn session_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn lookup(&self, code: &str) -> Option<Arc<RelaySession>> {
        self.sessions.read().get(code).cloned()
    }

    /// Remove the entry for `session.code()` if it still refers to `session`.
    pub fn remove(&self, session: &RelaySession) -> bool {
        let mut map = self.sessions.write();
        match map.get(session.code()) {
            Some(current) if current.id() == session.id() => {
                map.remove(session.code());
                true
            }
            _ => false,
        }
    }

    /// Tear a finished session down.
    ///
    /// Called once the server side's pumps have ended: stops new attaches,
    /// waits for attached clients to drain, then releases the code after
    /// `grace` (skipped when the session was cancelled).
    pub async fn retire(&self, session: &RelaySession, grace: Duration) {
        session.deactivate();
        session.wait_for_clients().await;

        let cancel = session.cancel_token();
        tokio::select! {
            _ = tokio::time::sleep(grace) => {}
            _ = cancel.cancelled() => {}
        }

        let removed = self.remove(session);
        debug!(
            code = %session.code(),
            session_id = session.id(),
            removed,
            "session retired"
        );
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Cancel every session created from [`SessionRegistry::session_token`]
    /// and deactivate the registered ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        for session in sessions {
            session.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let registry = SessionRegistry::new();
        let (session, _owner) = RelaySession::new("abc123", 8);
        assert!(registry.register(session.clone()).is_none());

        let found = registry.lookup("abc123").unwrap();
        assert_eq!(found.id(), session.id());
        assert!(registry.lookup("zzz").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregistration_replaces_and_old_remove_is_ignored() {
        let registry = SessionRegistry::new();
        let (old, _old_owner) = RelaySession::new("abc", 8);
        let (new, _new_owner) = RelaySession::new("abc", 8);

        registry.register(old.clone());
        let replaced = registry.register(new.clone()).unwrap();
        assert_eq!(replaced.id(), old.id());
        assert_eq!(registry.lookup("abc").unwrap().id(), new.id());

        assert!(!registry.remove(&old));
        assert_eq!(registry.lookup("abc").unwrap().id(), new.id());

        assert!(registry.remove(&new));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn retire_removes_after_grace() {
        tokio::time::pause();
        let registry = Arc::new(SessionRegistry::new());
        let (session, _owner) = RelaySession::new("abc", 8);
        registry.register(session.clone());

        let task = {
            let registry = registry.clone();
            let session = session.clone();
            tokio::spawn(async move {
                registry.retire(&session, Duration::from_secs(5)).await;
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!session.is_active());
        assert!(registry.lookup("abc").is_some(), "kept during grace");

        tokio::time::sleep(Duration::from_secs(5)).await;
        task.await.unwrap();
        assert!(registry.lookup("abc").is_none());
    }

    #[tokio::test]
    async fn retire_waits_for_clients() {
        let registry = SessionRegistry::new();
        let (session, _owner) = RelaySession::new("abc", 8);
        registry.register(session.clone());

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        session.clients().spawn(async move {
            let _ = release_rx.await;
        });

        let retire = registry.retire(&session, Duration::ZERO);
        tokio::pin!(retire);
        let early = tokio::time::timeout(Duration::from_millis(50), &mut retire).await;
        assert!(early.is_err(), "retire must wait for the attached client");
        assert!(registry.lookup("abc").is_some());

        release_tx.send(()).unwrap();
        retire.await;
        assert!(registry.lookup("abc").is_none());
    }

    #[test]
    fn shutdown_cancels_sessions() {
        let registry = SessionRegistry::new();
        let (a, _a) = RelaySession::new("a", 1);
        let (b, _b) = RelaySession::new("b", 1);
        registry.register(a.clone());
        registry.register(b.clone());

        registry.shutdown();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(!a.is_active());
    }

    #[test]
    fn shutdown_reaches_replaced_sessions() {
        let registry = SessionRegistry::new();
        let (old, _old) = RelaySession::with_cancel("dup", 1, registry.session_token());
        let (new, _new) = RelaySession::with_cancel("dup", 1, registry.session_token());
        registry.register(old.clone());
        registry.register(new.clone());

        registry.shutdown();
        assert!(old.is_cancelled());
        assert!(new.is_cancelled());
    }
}
