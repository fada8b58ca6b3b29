use relaymesh_core::RoomName;
use relaymesh_media::EngineEvent;
use tracing::{debug, warn};

use crate::state::AppState;

use super::protocol::ServerMessage;

/// Bridges engine-initiated close events back into the control plane
/// (spec.md §4.5: a transport/producer/consumer can close on the engine
/// side — ICE failure, a peer disconnecting its own `mediasoup` worker
/// side — without the signaling session ever sending a close message).
/// Runs for the lifetime of the process; a `RecvError::Closed` means the
/// adapter itself is gone, which only happens at shutdown.
pub fn spawn(state: AppState, mut events_rx: relaymesh_media::events::EngineEventReceiver) {
    tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => handle_event(&state, event).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "engine event bridge lagged, some events were dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("engine event channel closed, stopping bridge");
                    break;
                }
            }
        }
    });
}

async fn handle_event(state: &AppState, event: EngineEvent) {
    match event {
        EngineEvent::TransportClosed {
            room,
            owner,
            transport_id,
        } => {
            if let Some(mut session) = state.clients.get_mut(&owner) {
                session.transports.remove(&transport_id);
            }
            debug!(%room, %owner, %transport_id, "transport closed by engine");
        }

        EngineEvent::ProducerClosed {
            room,
            owner,
            producer_id,
        } => {
            state.rooms.remove_producer(&room, &producer_id);
            if let Some(mut session) = state.clients.get_mut(&owner) {
                session.producers.remove(&producer_id);
            }
            broadcast_producer_closed(state, &room, &owner, &producer_id).await;
        }

        EngineEvent::ConsumerClosed {
            room,
            owner,
            consumer_id,
        } => {
            if let Some(mut session) = state.clients.get_mut(&owner) {
                session.consumers.remove(&consumer_id);
            }
            debug!(%room, %owner, %consumer_id, "consumer closed by engine");
        }
    }
}

async fn broadcast_producer_closed(
    state: &AppState,
    room: &RoomName,
    owner: &relaymesh_core::ClientId,
    producer_id: &str,
) {
    let message = ServerMessage::SfuProducerClosed {
        room: room.to_string(),
        producer_id: producer_id.to_string(),
        client_id: owner.to_string(),
    };
    relaymesh_core::fanout::broadcast_to_room(&state.clients, &state.rooms, room, &message.to_text(), None)
        .await;
}
