use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, ConsumerId, ProducerId, RoomName, TransportId};

/// A member's standing within a room (spec.md §3 "memberRoles").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Observer,
    Moderator,
}

impl Role {
    pub fn can_produce(self) -> bool {
        matches!(self, Role::Publisher | Role::Moderator)
    }

    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Moderator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Transport direction, fixed at creation (spec.md §3 Transport Record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

/// Outbound channel abstraction so `relaymesh-core` never depends on axum's
/// websocket types directly — the session layer in `relaymesh-api` supplies
/// the concrete implementation over a split websocket sink.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send_text(&self, payload: String);
    /// Best-effort notification that the sink is no longer usable; cleanup
    /// does not depend on this being called (spec.md §5 idempotent cleanup).
    fn is_closed(&self) -> bool;
    /// Forces `is_closed()` to report true, e.g. after an auth failure that
    /// must close the channel (spec.md §6). No-op by default since most
    /// sinks only need the read path driven by the underlying transport.
    fn mark_closed(&self) {}
}

/// A transport created for one client (spec.md §3 Transport Record:
/// `{roomName, clientId, direction}`; `clientId` is the session's own id,
/// not duplicated here).
#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub id: TransportId,
    pub room: RoomName,
    pub direction: TransportDirection,
}

/// A producer created over a send transport (spec.md §3: "producers:
/// mapping producer id -> {clientId, kind, createdAt}").
#[derive(Debug, Clone)]
pub struct ProducerEntry {
    pub id: ProducerId,
    pub owner: ClientId,
    pub kind: MediaKind,
    pub transport_id: TransportId,
    pub created_at: DateTime<Utc>,
}

/// A consumer created to receive a remote producer (spec.md §3).
#[derive(Debug, Clone)]
pub struct ConsumerEntry {
    pub id: ConsumerId,
    pub owner: ClientId,
    pub producer_id: ProducerId,
    pub transport_id: TransportId,
}

/// An owned producer, with enough context to clean it up or report it
/// without a second lookup into the Room Registry.
#[derive(Debug, Clone)]
pub struct OwnedProducer {
    pub room: RoomName,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OwnedConsumer {
    pub room: RoomName,
    pub producer_id: ProducerId,
}

/// Per-connection session state (spec.md §3 Client Session). A session may
/// belong to zero-or-more rooms concurrently (spec.md §4.5 state machine:
/// "authenticated -> in-room is additive") — per-room `role` lives in the
/// Room Registry's `member_roles`, not here, since the same client id can in
/// principle hold different roles in different rooms.
pub struct ClientSession {
    pub id: ClientId,
    pub user: Option<AuthenticatedUser>,
    pub rooms: HashSet<RoomName>,
    pub transports: HashMap<TransportId, TransportInfo>,
    pub producers: HashMap<ProducerId, OwnedProducer>,
    pub consumers: HashMap<ConsumerId, OwnedConsumer>,
    pub sink: Box<dyn ClientSink>,
}

impl ClientSession {
    pub fn new(id: ClientId, user: Option<AuthenticatedUser>, sink: Box<dyn ClientSink>) -> Self {
        Self {
            id,
            user,
            rooms: HashSet::new(),
            transports: HashMap::new(),
            producers: HashMap::new(),
            consumers: HashMap::new(),
            sink,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(|u| u.is_admin).unwrap_or(false)
    }

    /// Producer ids this client owns within `room`, for room-scoped cleanup
    /// (spec.md §4.1 `closeResources`, §4.2 `closeClientProducers`).
    pub fn producers_in(&self, room: &RoomName) -> Vec<ProducerId> {
        self.producers
            .iter()
            .filter(|(_, p)| &p.room == room)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// The authenticated principal attached to a session, per spec.md §3
/// `user: {id, name, role}`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
    pub is_admin: bool,
}

/// Per-room policy knobs (spec.md §4.2, seeded from `relaymesh-config`'s
/// `RoomDefaults` at room-creation time and frozen for the room's lifetime).
#[derive(Debug, Clone, Copy)]
pub struct RoomOptions {
    pub max_video_producers: u32,
    pub allow_observers: bool,
    pub max_observers: u32,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            max_video_producers: 0,
            allow_observers: true,
            max_observers: 0,
        }
    }
}

/// Shared room state (spec.md §3 Room). Router/engine handles live in
/// `relaymesh-media`; this struct only tracks control-plane membership and
/// the producer catalog needed to answer "what can I consume".
pub struct Room {
    pub name: RoomName,
    pub options: RoomOptions,
    /// Insertion order matters for owner reassignment (spec.md §3 "ownerId
    /// ... reassigned ... to the next publisher or moderator in iteration
    /// order").
    pub member_roles: IndexMap<ClientId, Role>,
    /// The first publisher/moderator to join; reassigned by scanning
    /// `member_roles` in insertion order when the current owner leaves
    /// (spec.md §3, §4.2). Not the same thing as a member's `role` — joining
    /// does not change the role a client asked for.
    pub owner_id: Option<ClientId>,
    pub producers: HashMap<ProducerId, ProducerEntry>,
    pub recording_active: bool,
}

impl Room {
    pub fn new(name: RoomName, options: RoomOptions) -> Self {
        Self {
            name,
            options,
            member_roles: IndexMap::new(),
            owner_id: None,
            producers: HashMap::new(),
            recording_active: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.member_roles.is_empty()
    }

    pub fn video_producer_count(&self) -> usize {
        self.producers
            .values()
            .filter(|p| p.kind == MediaKind::Video)
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.member_roles
            .values()
            .filter(|r| **r == Role::Observer)
            .count()
    }

    /// The earliest-joined remaining publisher or moderator, used when the
    /// acting moderator disconnects (spec.md §4.2).
    pub fn next_owner_candidate(&self, exclude: &ClientId) -> Option<ClientId> {
        self.member_roles
            .iter()
            .find(|(id, role)| *id != exclude && role.can_produce())
            .map(|(id, _)| id.clone())
    }
}
