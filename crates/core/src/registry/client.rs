use dashmap::DashMap;

use crate::ids::ClientId;
use crate::model::ClientSession;

/// Connection id -> session state, the first of the two central shared-state
/// tables (spec.md §4.1 Client Registry). Keyed by `ClientId` with a
/// per-shard lock via `DashMap` rather than one global `Mutex`/`RwLock` —
/// the expected scale (spec.md §5: "dozens to low hundreds of concurrent
/// sessions") makes shard contention a non-issue while avoiding a
/// single serialization point for unrelated clients.
#[derive(Default)]
pub struct ClientRegistry {
    sessions: DashMap<ClientId, ClientSession>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: ClientSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Removes the session. Tolerates being called more than once for the
    /// same id (spec.md §5 idempotent cleanup) — a second call is a no-op.
    pub fn unregister(&self, id: &ClientId) -> Option<ClientSession> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(
        &self,
        id: &ClientId,
    ) -> Option<dashmap::mapref::one::Ref<'_, ClientId, ClientSession>> {
        self.sessions.get(id)
    }

    pub fn get_mut(
        &self,
        id: &ClientId,
    ) -> Option<dashmap::mapref::one::RefMut<'_, ClientId, ClientSession>> {
        self.sessions.get_mut(id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}
