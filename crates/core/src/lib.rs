pub mod error;
pub mod fanout;
pub mod ids;
pub mod model;
pub mod registry;

pub use error::SignalError;
pub use ids::{ClientId, ConsumerId, ProducerId, RoomName, TransportId};
pub use model::{
    AuthenticatedUser, ClientSession, ClientSink, ConsumerEntry, MediaKind, OwnedConsumer,
    OwnedProducer, ProducerEntry, Role, Room, RoomOptions, TransportDirection, TransportInfo,
};
pub use registry::{ClientRegistry, RoomRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct NullSink {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ClientSink for NullSink {
        async fn send_text(&self, _payload: String) {}

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn session(id: ClientId) -> ClientSession {
        ClientSession::new(
            id,
            None,
            Box::new(NullSink {
                closed: Arc::new(AtomicBool::new(false)),
            }),
        )
    }

    #[test]
    fn first_non_observer_becomes_owner() {
        let rooms = RoomRegistry::new();
        let room: RoomName = "room-a".into();
        let observer = ClientId::new();
        let publisher = ClientId::new();

        rooms.add_member(&room, observer.clone(), Role::Observer, RoomOptions::default());
        rooms.add_member(&room, publisher.clone(), Role::Publisher, RoomOptions::default());

        let stored = rooms.get(&room).unwrap();
        assert_eq!(stored.owner_id, Some(publisher));
        assert_eq!(stored.member_roles.get(&observer), Some(&Role::Observer));
    }

    #[test]
    fn owner_departure_promotes_earliest_remaining_publisher() {
        let rooms = RoomRegistry::new();
        let room: RoomName = "room-b".into();
        let owner = ClientId::new();
        let pub_id = ClientId::new();
        let obs_id = ClientId::new();

        rooms.add_member(&room, owner.clone(), Role::Publisher, RoomOptions::default());
        rooms.add_member(&room, pub_id.clone(), Role::Publisher, RoomOptions::default());
        rooms.add_member(&room, obs_id.clone(), Role::Observer, RoomOptions::default());

        rooms.remove_member(&room, &owner);

        let stored = rooms.get(&room).unwrap();
        assert_eq!(stored.owner_id, Some(pub_id.clone()));
        assert_eq!(stored.member_roles.get(&pub_id), Some(&Role::Publisher));
        assert_eq!(stored.member_roles.get(&obs_id), Some(&Role::Observer));
    }

    #[test]
    fn removing_member_returns_and_drops_owned_producers() {
        let rooms = RoomRegistry::new();
        let room: RoomName = "room-c".into();
        let owner = ClientId::new();
        rooms.add_member(&room, owner.clone(), Role::Publisher, RoomOptions::default());
        rooms.add_producer(
            &room,
            ProducerEntry {
                id: "prod-1".into(),
                owner: owner.clone(),
                kind: MediaKind::Video,
                transport_id: "t1".into(),
                created_at: Utc::now(),
            },
        );

        let dropped = rooms.remove_member(&room, &owner);
        assert_eq!(dropped, vec!["prod-1".to_string()]);
        assert_eq!(rooms.get(&room).unwrap().producers.len(), 0);
    }

    #[test]
    fn delete_if_empty_is_idempotent() {
        let rooms = RoomRegistry::new();
        let room: RoomName = "room-d".into();
        let alice = ClientId::new();
        rooms.add_member(&room, alice.clone(), Role::Publisher, RoomOptions::default());
        rooms.remove_member(&room, &alice);

        rooms.delete_if_empty(&room);
        rooms.delete_if_empty(&room);
        assert!(rooms.get(&room).is_none());
    }

    #[test]
    fn video_producer_count_ignores_audio() {
        let rooms = RoomRegistry::new();
        let room: RoomName = "room-e".into();
        let owner = ClientId::new();
        rooms.add_member(&room, owner.clone(), Role::Publisher, RoomOptions::default());
        rooms.add_producer(
            &room,
            ProducerEntry {
                id: "audio-1".into(),
                owner: owner.clone(),
                kind: MediaKind::Audio,
                transport_id: "t1".into(),
                created_at: Utc::now(),
            },
        );
        rooms.add_producer(
            &room,
            ProducerEntry {
                id: "video-1".into(),
                owner,
                kind: MediaKind::Video,
                transport_id: "t1".into(),
                created_at: Utc::now(),
            },
        );

        assert_eq!(rooms.get(&room).unwrap().video_producer_count(), 1);
    }

    #[test]
    fn client_registry_unregister_twice_is_a_noop() {
        let clients = ClientRegistry::new();
        let id = ClientId::new();
        clients.register(session(id.clone()));

        assert!(clients.unregister(&id).is_some());
        assert!(clients.unregister(&id).is_none());
    }
}
