//! P2P group membership (§4.9).
//!
//! The wire protocol's `JoinP2p`/`LeaveP2p` properties only carry a session
//! id; this resolves the original spec's open question about what "joining"
//! means by modeling it as membership in a single flat group per session —
//! a session can belong to at most one group at a time. Group membership is
//! purely advisory bookkeeping: the UDP relay (§4.5) addresses any live
//! session by id regardless of group, so `P2pManager` does not gate it.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::session::SessionId;

/// Tracks which sessions are grouped together for relay purposes.
#[derive(Default)]
pub struct P2pManager {
    // session -> group members (including itself), shared across the group.
    groups: RwLock<HashMap<SessionId, HashSet<SessionId>>>,
}

impl P2pManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `session` to `group`. Creates the group if it doesn't exist yet.
    /// A session already in a different group is moved: it leaves its old
    /// group first (idempotent join, matching the `PunchedEndPoint`
    /// set-once style of tolerating repeats without erroring).
    pub fn join(&self, session: SessionId, group: SessionId) {
        let mut groups = self.groups.write();
        for members in groups.values_mut() {
            members.remove(&session);
        }
        groups.entry(group).or_insert_with(HashSet::new).insert(group);
        groups.entry(group).or_insert_with(HashSet::new).insert(session);
    }

    /// Remove `session` from whatever group it currently belongs to.
    pub fn leave(&self, session: SessionId) {
        let mut groups = self.groups.write();
        groups.retain(|_, members| {
            members.remove(&session);
            !members.is_empty()
        });
    }

    /// All sessions in `session`'s group, excluding `session` itself.
    pub fn members_of(&self, session: SessionId) -> Vec<SessionId> {
        let groups = self.groups.read();
        groups
            .values()
            .find(|members| members.contains(&session))
            .map(|members| members.iter().copied().filter(|m| *m != session).collect())
            .unwrap_or_default()
    }

    /// Release every membership a closing session held.
    pub fn on_session_closed(&self, session: SessionId) {
        self.leave(session);
    }

    pub fn clear(&self) {
        self.groups.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_then_members_of_excludes_self() {
        let p2p = P2pManager::new();
        p2p.join(1, 1);
        p2p.join(2, 1);
        p2p.join(3, 1);

        let mut members = p2p.members_of(2);
        members.sort();
        assert_eq!(members, vec![1, 3]);
    }

    #[test]
    fn leave_removes_from_group() {
        let p2p = P2pManager::new();
        p2p.join(1, 1);
        p2p.join(2, 1);
        p2p.leave(1);
        assert_eq!(p2p.members_of(2), Vec::<SessionId>::new());
    }

    #[test]
    fn rejoining_a_new_group_leaves_the_old_one() {
        let p2p = P2pManager::new();
        p2p.join(1, 1);
        p2p.join(2, 1);
        p2p.join(1, 2);
        assert_eq!(p2p.members_of(2), Vec::<SessionId>::new());
        assert_eq!(p2p.members_of(1), vec![2]);
    }
}
