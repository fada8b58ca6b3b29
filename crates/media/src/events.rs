use relaymesh_core::{ClientId, ConsumerId, ProducerId, RoomName, TransportId};

/// Engine-initiated state changes the Fan-out & Event Bridge (in
/// `relaymesh-api`) needs to hear about, so it can update the registries and
/// notify affected clients even when nothing asked for the closure
/// explicitly (spec.md §4.5 — e.g. a transport dying because the worker
/// hosting it died).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TransportClosed {
        room: RoomName,
        owner: ClientId,
        transport_id: TransportId,
    },
    ProducerClosed {
        room: RoomName,
        owner: ClientId,
        producer_id: ProducerId,
    },
    ConsumerClosed {
        room: RoomName,
        owner: ClientId,
        consumer_id: ConsumerId,
    },
}

pub type EngineEventSender = tokio::sync::broadcast::Sender<EngineEvent>;
pub type EngineEventReceiver = tokio::sync::broadcast::Receiver<EngineEvent>;

/// Default capacity for the engine event broadcast channel. Lagging
/// receivers only miss stale close notifications, which the registries
/// already treat as idempotent, so a bounded channel is safe.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
