use dashmap::DashMap;

use crate::ids::{ClientId, ProducerId, RoomName};
use crate::model::{ProducerEntry, Room, RoomOptions, Role};

/// Room name -> membership/producers/options, the second of the two central
/// shared-state tables (spec.md §4.2 Room Registry).
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomName, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room, creating it with `options` if it does not exist
    /// yet (spec.md §4.2: rooms are created implicitly by the first join).
    pub fn get_or_create(
        &self,
        name: &RoomName,
        options: RoomOptions,
    ) -> dashmap::mapref::one::RefMut<'_, RoomName, Room> {
        self.rooms
            .entry(name.clone())
            .or_insert_with(|| Room::new(name.clone(), options))
    }

    pub fn get(&self, name: &RoomName) -> Option<dashmap::mapref::one::Ref<'_, RoomName, Room>> {
        self.rooms.get(name)
    }

    pub fn get_mut(
        &self,
        name: &RoomName,
    ) -> Option<dashmap::mapref::one::RefMut<'_, RoomName, Room>> {
        self.rooms.get_mut(name)
    }

    /// Adds `client` to `room` with `role`, exactly as requested — joining
    /// never changes a client's role. If the room has no owner yet and this
    /// role is not `Observer`, `client` becomes the owner (spec.md §3, §4.4
    /// "set ownerId if null and role != observer").
    pub fn add_member(&self, name: &RoomName, client: ClientId, role: Role, options: RoomOptions) {
        let mut room = self.get_or_create(name, options);
        if room.owner_id.is_none() && role != Role::Observer {
            room.owner_id = Some(client.clone());
        }
        room.member_roles.insert(client, role);
    }

    /// Removes `client` from `room`, promoting a successor moderator if the
    /// departing member held that role (spec.md §4.2). Returns the set of
    /// producer ids the client owned so the caller can clean up engine
    /// resources outside any lock (spec.md §5: no engine calls while a
    /// registry lock is held).
    pub fn remove_member(&self, name: &RoomName, client: &ClientId) -> Vec<ProducerId> {
        let Some(mut room) = self.rooms.get_mut(name) else {
            return Vec::new();
        };
        room.member_roles.shift_remove(client);

        if room.owner_id.as_ref() == Some(client) {
            room.owner_id = room.next_owner_candidate(client);
        }

        let owned: Vec<ProducerId> = room
            .producers
            .iter()
            .filter(|(_, entry)| &entry.owner == client)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &owned {
            room.producers.remove(id);
        }
        owned
    }

    /// Deletes the room if it has no members left. Idempotent: calling this
    /// on an already-deleted or already-empty-and-removed room is a no-op
    /// (spec.md §5).
    pub fn delete_if_empty(&self, name: &RoomName) {
        let should_remove = self.rooms.get(name).map(|r| r.is_empty()).unwrap_or(false);
        if should_remove {
            self.rooms.remove_if(name, |_, room| room.is_empty());
        }
    }

    pub fn add_producer(&self, name: &RoomName, entry: ProducerEntry) {
        if let Some(mut room) = self.rooms.get_mut(name) {
            room.producers.insert(entry.id.clone(), entry);
        }
    }

    /// Removes a single producer by id, used when the owning client closes
    /// it explicitly rather than disconnecting entirely.
    pub fn remove_producer(&self, name: &RoomName, producer_id: &ProducerId) {
        if let Some(mut room) = self.rooms.get_mut(name) {
            room.producers.remove(producer_id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_names(&self) -> Vec<RoomName> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }
}
