//! Fixed-capacity session registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Session, SessionId};
use crate::error::{Result, ServerError};

/// Owns every live [`Session`], keyed by [`SessionId`], under a single
/// `RwLock<HashMap>`. Capacity is enforced at `insert` time; iteration
/// (`for_each`) takes a point-in-time snapshot of the `Arc<Session>` values
/// so a session closing mid-sweep can't deadlock the scheduler or be mutated
/// out from under a caller holding no lock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    max_session: u16,
}

impl SessionRegistry {
    pub fn new(max_session: u16) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            max_session,
        }
    }

    pub fn capacity(&self) -> u16 {
        self.max_session
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.max_session as usize
    }

    /// Insert a new session. Fails with [`ServerError::CapacityExceeded`] if
    /// the registry is already at `max_session`, or if `id` is already in use.
    pub fn insert(&self, session: Arc<Session>) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_session as usize {
            return Err(ServerError::CapacityExceeded);
        }
        if sessions.contains_key(&session.id) {
            return Err(ServerError::Fatal(format!(
                "duplicate session id {}",
                session.id
            )));
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().remove(&id)
    }

    pub fn find(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    /// Snapshot every live session and invoke `f` on each, outside the lock.
    /// Used by the update scheduler so a slow or closing session can't hold
    /// up registry reads/writes from other threads.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Session>)) {
        let snapshot: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        for session in &snapshot {
            f(session);
        }
    }

    /// Remove every session currently in [`super::SessionState::Closed`].
    /// Called once per scheduler sweep.
    pub fn reap_closed(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let closed_ids: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| s.state() == super::SessionState::Closed)
            .map(|(id, _)| *id)
            .collect();
        closed_ids
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::TcpChannel;
    use std::net::{TcpListener, TcpStream};

    fn make_session(id: SessionId) -> Arc<Session> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_stream, _) = listener.accept().unwrap();
        let _ = client;
        let channel = TcpChannel::new(server_stream).unwrap();
        Arc::new(Session::new(id, id as i64, channel, None))
    }

    #[test]
    fn insert_respects_capacity() {
        let registry = SessionRegistry::new(1);
        registry.insert(make_session(1)).unwrap();
        let err = registry.insert(make_session(2)).unwrap_err();
        assert!(matches!(err, ServerError::CapacityExceeded));
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let registry = SessionRegistry::new(5);
        registry.insert(make_session(1)).unwrap();
        let err = registry.insert(make_session(1)).unwrap_err();
        assert!(matches!(err, ServerError::Fatal(_)));
    }

    #[test]
    fn remove_and_find_round_trip() {
        let registry = SessionRegistry::new(5);
        registry.insert(make_session(7)).unwrap();
        assert!(registry.find(7).is_some());
        let removed = registry.remove(7).unwrap();
        assert_eq!(removed.id, 7);
        assert!(registry.find(7).is_none());
    }

    #[test]
    fn reap_closed_only_removes_closed_sessions() {
        let registry = SessionRegistry::new(5);
        let a = make_session(1);
        let b = make_session(2);
        b.set_state(super::super::SessionState::Closed);
        registry.insert(a).unwrap();
        registry.insert(b).unwrap();

        let reaped = registry.reap_closed();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, 2);
        assert_eq!(registry.count(), 1);
    }
}
