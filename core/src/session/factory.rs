//! Session id allocation and `ConnectId` minting.

use parking_lot::Mutex;
use rand::Rng;

use super::{ConnectId, SessionId};
use crate::error::{Result, ServerError};

/// Hands out [`SessionId`]s from a fixed pool of `1..=max_session` (`0` is
/// reserved) and recycles them on release, so a long-running server never
/// exhausts the id space even under constant churn.
pub struct SessionFactory {
    max_session: u16,
    free_ids: Mutex<Vec<SessionId>>,
}

impl SessionFactory {
    pub fn new(max_session: u16) -> Self {
        // Hand out ids in ascending order on a fresh server: push descending
        // so `pop()` yields 1, 2, 3, ...
        let mut free_ids: Vec<SessionId> = (1..=max_session).collect();
        free_ids.reverse();
        SessionFactory {
            max_session,
            free_ids: Mutex::new(free_ids),
        }
    }

    pub fn capacity(&self) -> u16 {
        self.max_session
    }

    /// Allocate the next free id, or [`ServerError::CapacityExceeded`] if the
    /// pool is exhausted.
    pub fn allocate_id(&self) -> Result<SessionId> {
        self.free_ids.lock().pop().ok_or(ServerError::CapacityExceeded)
    }

    /// Return an id to the pool so it can be reused by a future connection.
    pub fn release_id(&self, id: SessionId) {
        self.free_ids.lock().push(id);
    }

    /// Mint a fresh random `ConnectId` nonce for a new session's rendezvous.
    pub fn mint_connect_id(&self) -> ConnectId {
        rand::rng().random::<i64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_unique_ids_up_to_capacity() {
        let factory = SessionFactory::new(3);
        let a = factory.allocate_id().unwrap();
        let b = factory.allocate_id().unwrap();
        let c = factory.allocate_id().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(factory.allocate_id().is_err());
    }

    #[test]
    fn released_id_is_reused() {
        let factory = SessionFactory::new(1);
        let id = factory.allocate_id().unwrap();
        assert!(factory.allocate_id().is_err());
        factory.release_id(id);
        assert_eq!(factory.allocate_id().unwrap(), id);
    }

    #[test]
    fn mint_connect_id_is_not_trivially_constant() {
        let factory = SessionFactory::new(1);
        let a = factory.mint_connect_id();
        let b = factory.mint_connect_id();
        assert_ne!(a, b);
    }
}
