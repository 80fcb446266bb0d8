//! Session registry.
//!
//! An explicit registry object with a defined lifecycle, injected into
//! callers. Tests instantiate isolated registries instead of sharing
//! ambient global state.

use crate::types::{ScanSession, ScanStage, ScanTarget, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Tracks active scan sessions by id.
///
/// Cheap to clone; clones share the underlying map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, ScanSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session in the `Created` stage.
    pub fn create(&self, target: ScanTarget, channel: impl Into<String>) -> ScanSession {
        let session = ScanSession::new(target, channel);
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .insert(session.id, session.clone());
        debug!(id = %session.id, target = %session.target, "registered session");
        session
    }

    /// Look up a session snapshot by id.
    pub fn lookup(&self, id: SessionId) -> Option<ScanSession> {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .get(&id)
            .cloned()
    }

    /// Advance a session's stage, honoring the transition rules.
    ///
    /// Returns `false` if the session is unknown or the transition is
    /// illegal.
    pub fn advance(&self, id: SessionId, next: ScanStage) -> bool {
        let mut map = self.sessions.lock().expect("session registry poisoned");
        match map.get_mut(&id) {
            Some(session) => session.advance(next),
            None => false,
        }
    }

    /// Record the background job reference on a session.
    pub fn set_job_ref(&self, id: SessionId, job_ref: impl Into<String>) {
        let mut map = self.sessions.lock().expect("session registry poisoned");
        if let Some(session) = map.get_mut(&id) {
            session.job_ref = Some(job_ref.into());
        }
    }

    /// Remove a session, returning its final snapshot.
    pub fn remove(&self, id: SessionId) -> Option<ScanSession> {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .remove(&id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session.
    pub fn shutdown_all(&self) {
        let mut map = self.sessions.lock().expect("session registry poisoned");
        debug!(count = map.len(), "session registry shut down");
        map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let registry = SessionRegistry::new();
        let session = registry.create(ScanTarget::parse("10.0.0.1").unwrap(), "c1");

        let found = registry.lookup(session.id).unwrap();
        assert_eq!(found.stage, ScanStage::Created);
        assert_eq!(found.channel, "c1");
    }

    #[test]
    fn test_advance_through_registry() {
        let registry = SessionRegistry::new();
        let session = registry.create(ScanTarget::parse("10.0.0.1").unwrap(), "c1");

        assert!(registry.advance(session.id, ScanStage::Pinging));
        assert!(!registry.advance(session.id, ScanStage::Complete));
        assert_eq!(registry.lookup(session.id).unwrap().stage, ScanStage::Pinging);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(registry.lookup(SessionId::new()).is_none());
        assert!(!registry.advance(SessionId::new(), ScanStage::Pinging));
    }

    #[test]
    fn test_isolated_registries() {
        let a = SessionRegistry::new();
        let b = SessionRegistry::new();
        let session = a.create(ScanTarget::parse("10.0.0.1").unwrap(), "c1");

        assert!(a.lookup(session.id).is_some());
        assert!(b.lookup(session.id).is_none());
    }

    #[test]
    fn test_shutdown_all() {
        let registry = SessionRegistry::new();
        registry.create(ScanTarget::parse("10.0.0.1").unwrap(), "c1");
        registry.create(ScanTarget::parse("10.0.0.2").unwrap(), "c2");
        assert_eq!(registry.len(), 2);

        registry.shutdown_all();
        assert!(registry.is_empty());
    }
}
