use relaymesh_core::{
    ClientId, MediaKind, OwnedConsumer, OwnedProducer, ProducerEntry, Role, RoomName,
    SignalError, TransportDirection, TransportInfo,
};
use tracing::warn;

use crate::state::AppState;

use super::protocol::{ClientMessage, ProducerSummary, RoomSummary, ServerMessage};

/// Routes one decoded client message to its handler, honoring spec.md
/// §4.4's validation order: feature availability, required fields, client
/// existence, role permissions, room existence/preconditions. Each handler
/// enforces its own slice of that order since the fields it needs differ
/// per message type.
pub async fn dispatch(state: &AppState, client_id: &ClientId, message: ClientMessage) {
    let result = match message {
        ClientMessage::Join { room, role, .. } => handle_join(state, client_id, room, role).await,
        ClientMessage::LeaveRoom { room, .. } => handle_leave_room(state, client_id, room).await,
        ClientMessage::Leave {} => {
            // Spec.md §6: no reply, no broadcast — purely a client-side no-op
            // placeholder distinct from channel-close's disconnect path.
            Ok(())
        }
        ClientMessage::List { .. } => handle_list(state, client_id).await,
        ClientMessage::Rooms { .. } => handle_rooms(state, client_id).await,
        ClientMessage::Ice { candidate, to, room } => {
            handle_ice(state, client_id, candidate, to, room).await
        }
        ClientMessage::Offer(envelope) => handle_relay(state, client_id, "offer", envelope).await,
        ClientMessage::Answer(envelope) => handle_relay(state, client_id, "answer", envelope).await,
        ClientMessage::Candidate(envelope) => {
            handle_relay(state, client_id, "candidate", envelope).await
        }
        ClientMessage::SfuCreateTransport { room, direction, .. } => {
            handle_create_transport(state, client_id, room, direction).await
        }
        ClientMessage::SfuConnectTransport {
            transport_id,
            dtls_parameters,
            ..
        } => handle_connect_transport(state, client_id, transport_id, dtls_parameters).await,
        ClientMessage::SfuProduce {
            transport_id,
            kind,
            rtp_parameters,
            room,
            ..
        } => handle_produce(state, client_id, transport_id, kind, rtp_parameters, room).await,
        ClientMessage::SfuConsume {
            transport_id,
            producer_id,
            rtp_capabilities,
            room,
            ..
        } => handle_consume(state, client_id, transport_id, producer_id, rtp_capabilities, room).await,
        ClientMessage::SfuListProducers { room, .. } => {
            handle_list_producers(state, client_id, room).await
        }
        ClientMessage::SfuCloseProducer { producer_id, .. } => {
            handle_close_producer(state, client_id, producer_id).await
        }
        ClientMessage::StartRecording {
            room, producer_id, ..
        } => handle_start_recording(state, client_id, room, producer_id).await,
        ClientMessage::StopRecording {
            room, producer_id, ..
        } => handle_stop_recording(state, client_id, room, producer_id).await,
        ClientMessage::AdminRooms { .. } => handle_admin_rooms(state, client_id).await,
        ClientMessage::AdminRoomInfo { room, .. } => {
            handle_admin_room_info(state, client_id, room).await
        }
        ClientMessage::AdminMetrics { .. } => handle_admin_metrics(state, client_id).await,
    };

    if let Err(err) = result {
        reply(state, client_id, ServerMessage::error(err.message())).await;
        if err.closes_channel() {
            if let Some(session) = state.clients.get(client_id) {
                session.sink.mark_closed();
            }
        }
    }
}

async fn reply(state: &AppState, client_id: &ClientId, message: ServerMessage) {
    relaymesh_core::fanout::send_to_client(&state.clients, client_id, &message.to_text()).await;
}

async fn broadcast(state: &AppState, room: &RoomName, message: &ServerMessage, exclude: Option<&ClientId>) {
    relaymesh_core::fanout::broadcast_to_room(
        &state.clients,
        &state.rooms,
        room,
        &message.to_text(),
        exclude,
    )
    .await;
}

fn room_options(state: &AppState) -> relaymesh_core::RoomOptions {
    relaymesh_core::RoomOptions {
        max_video_producers: state.settings.room.max_video_producers,
        allow_observers: state.settings.room.allow_observers,
        max_observers: state.settings.room.max_observers,
    }
}

fn require_engine(state: &AppState) -> Result<&std::sync::Arc<relaymesh_media::EngineAdapter>, SignalError> {
    state
        .engine
        .as_ref()
        .ok_or_else(|| SignalError::state("sfu not enabled"))
}

async fn handle_join(
    state: &AppState,
    client_id: &ClientId,
    room: String,
    role: Option<Role>,
) -> Result<(), SignalError> {
    if room.is_empty() {
        return Err(SignalError::validation("room"));
    }
    let role = role.unwrap_or(Role::Publisher);

    if role == Role::Moderator {
        let is_admin = state
            .clients
            .get(client_id)
            .map(|s| s.is_admin())
            .unwrap_or(false);
        if !is_admin {
            return Err(SignalError::policy("only admin users can join as moderator"));
        }
    }

    let room_name: RoomName = room.clone().into();
    let options = room_options(state);

    if role == Role::Observer {
        let room_ref = state.rooms.get_or_create(&room_name, options);
        let allowed = room_ref.options.allow_observers;
        let over_capacity = room_ref.options.max_observers > 0
            && room_ref.observer_count() >= room_ref.options.max_observers as usize;
        drop(room_ref);

        if !allowed {
            state.rooms.delete_if_empty(&room_name);
            return Err(SignalError::policy("observers are not allowed in this room"));
        }
        if over_capacity {
            state.rooms.delete_if_empty(&room_name);
            return Err(SignalError::policy("room already has the maximum number of observers"));
        }
    }

    state.rooms.add_member(&room_name, client_id.clone(), role, options);
    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.rooms.insert(room_name.clone());
    }

    reply(
        state,
        client_id,
        ServerMessage::Joined {
            room: room.clone(),
            id: client_id.to_string(),
            role,
        },
    )
    .await;

    if role == Role::Observer {
        let producers = producer_summaries(state, &room_name);
        reply(
            state,
            client_id,
            ServerMessage::SfuProducers {
                room: room.clone(),
                producers,
            },
        )
        .await;
    }

    broadcast(
        state,
        &room_name,
        &ServerMessage::MemberJoined {
            room,
            id: client_id.to_string(),
            role,
        },
        Some(client_id),
    )
    .await;

    Ok(())
}

async fn handle_leave_room(
    state: &AppState,
    client_id: &ClientId,
    room: String,
) -> Result<(), SignalError> {
    if room.is_empty() {
        return Err(SignalError::validation("room"));
    }
    let room_name: RoomName = room.clone().into();

    close_client_producers_in_room(state, client_id, &room_name).await;
    state.rooms.remove_member(&room_name, client_id);
    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.rooms.remove(&room_name);
    }

    reply(
        state,
        client_id,
        ServerMessage::Left {
            room: room.clone(),
            id: client_id.to_string(),
        },
    )
    .await;

    broadcast(
        state,
        &room_name,
        &ServerMessage::MemberLeft {
            room,
            id: client_id.to_string(),
        },
        Some(client_id),
    )
    .await;

    state.rooms.delete_if_empty(&room_name);
    Ok(())
}

async fn handle_list(state: &AppState, client_id: &ClientId) -> Result<(), SignalError> {
    let clients = state.clients.ids().into_iter().map(|id| id.to_string()).collect();
    reply(state, client_id, ServerMessage::List { clients }).await;
    Ok(())
}

async fn handle_rooms(state: &AppState, client_id: &ClientId) -> Result<(), SignalError> {
    let rooms = state
        .rooms
        .room_names()
        .into_iter()
        .filter_map(|name| {
            state.rooms.get(&name).map(|room| RoomSummary {
                name: name.to_string(),
                count: room.member_roles.len(),
            })
        })
        .collect();
    reply(state, client_id, ServerMessage::Rooms { rooms }).await;
    Ok(())
}

async fn handle_ice(
    state: &AppState,
    client_id: &ClientId,
    candidate: serde_json::Value,
    to: Option<String>,
    room: Option<String>,
) -> Result<(), SignalError> {
    let message = ServerMessage::Ice {
        from: client_id.to_string(),
        candidate,
    };
    if let Some(to) = to {
        reply(state, &to.into(), message).await;
    } else if let Some(room) = room {
        broadcast(state, &room.into(), &message, Some(client_id)).await;
    } else {
        return Err(SignalError::validation("to or room"));
    }
    Ok(())
}

async fn handle_relay(
    state: &AppState,
    client_id: &ClientId,
    kind: &str,
    mut envelope: super::protocol::RelayEnvelope,
) -> Result<(), SignalError> {
    envelope.from = Some(client_id.to_string());
    let mut payload = serde_json::to_value(&envelope).unwrap_or_default();
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("type".to_string(), serde_json::Value::String(kind.to_string()));
    }
    let text = serde_json::to_string(&payload).unwrap_or_default();

    if let Some(to) = envelope.to {
        relaymesh_core::fanout::send_to_client(&state.clients, &to.into(), &text).await;
    } else if let Some(room) = envelope.room {
        relaymesh_core::fanout::broadcast_to_room(
            &state.clients,
            &state.rooms,
            &room.into(),
            &text,
            Some(client_id),
        )
        .await;
    } else {
        return Err(SignalError::validation("to or room"));
    }
    Ok(())
}

async fn handle_create_transport(
    state: &AppState,
    client_id: &ClientId,
    room: String,
    direction: Option<String>,
) -> Result<(), SignalError> {
    let engine = require_engine(state)?;
    if room.is_empty() {
        return Err(SignalError::validation("room"));
    }
    let room_name: RoomName = room.clone().into();
    if state.rooms.get(&room_name).is_none() {
        return Err(SignalError::state("room does not exist"));
    }

    let direction = match direction.as_deref() {
        None | Some("send") => TransportDirection::Send,
        Some("recv") => TransportDirection::Recv,
        Some(_) => return Err(SignalError::validation("direction")),
    };

    let router_rtp_capabilities = engine
        .ensure_room(&room_name)
        .await
        .map_err(engine_err("createTransport"))?;
    let pair = engine
        .create_transports(&room_name, client_id)
        .await
        .map_err(engine_err("createTransport"))?;

    let picked = match direction {
        TransportDirection::Send => pair.send,
        TransportDirection::Recv => pair.recv,
    };

    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.transports.insert(
            picked.id.clone(),
            TransportInfo {
                id: picked.id.clone(),
                room: room_name.clone(),
                direction,
            },
        );
    }

    reply(
        state,
        client_id,
        ServerMessage::SfuTransportCreated {
            transport_id: picked.id,
            ice_parameters: picked.ice_parameters,
            ice_candidates: picked.ice_candidates,
            dtls_parameters: picked.dtls_parameters,
            ice_servers: state.settings.ice_servers.clone(),
            router_rtp_capabilities,
            direction: match direction {
                TransportDirection::Send => "send".to_string(),
                TransportDirection::Recv => "recv".to_string(),
            },
        },
    )
    .await;
    Ok(())
}

async fn handle_connect_transport(
    state: &AppState,
    client_id: &ClientId,
    transport_id: String,
    dtls_parameters: serde_json::Value,
) -> Result<(), SignalError> {
    let engine = require_engine(state)?;
    let room = {
        let session = state
            .clients
            .get(client_id)
            .ok_or_else(|| SignalError::state("client not found"))?;
        session
            .transports
            .get(&transport_id)
            .map(|t| t.room.clone())
            .ok_or_else(|| SignalError::state("transport not found"))?
    };

    engine
        .connect_transport(&room, client_id, &transport_id, dtls_parameters)
        .await
        .map_err(engine_err("connectTransport"))?;

    reply(
        state,
        client_id,
        ServerMessage::SfuTransportConnected { transport_id },
    )
    .await;
    Ok(())
}

async fn handle_produce(
    state: &AppState,
    client_id: &ClientId,
    transport_id: String,
    kind: MediaKind,
    rtp_parameters: serde_json::Value,
    room: String,
) -> Result<(), SignalError> {
    let engine = require_engine(state)?;
    let role = current_role(state, client_id, &room)?;
    if !role.can_produce() {
        return Err(SignalError::policy("observers cannot produce"));
    }

    let room_name: RoomName = room.clone().into();
    let transport_room = {
        let session = state
            .clients
            .get(client_id)
            .ok_or_else(|| SignalError::state("client not found"))?;
        session
            .transports
            .get(&transport_id)
            .map(|t| t.room.clone())
            .ok_or_else(|| SignalError::state("transport not found"))?
    };
    if transport_room != room_name {
        return Err(SignalError::state("transport belongs to different room"));
    }

    if kind == MediaKind::Video {
        let max = state
            .rooms
            .get(&room_name)
            .map(|r| r.options.max_video_producers)
            .unwrap_or(0);
        if max > 0 {
            let current = state
                .rooms
                .get(&room_name)
                .map(|r| r.video_producer_count())
                .unwrap_or(0);
            if current >= max as usize {
                return Err(SignalError::policy(format!(
                    "room already has {max} video producers"
                )));
            }
        }
    }

    let producer_id = engine
        .produce(&room_name, client_id, kind, rtp_parameters)
        .await
        .map_err(engine_err("produce"))?;

    let created_at = chrono::Utc::now();
    state.rooms.add_producer(
        &room_name,
        ProducerEntry {
            id: producer_id.clone(),
            owner: client_id.clone(),
            kind,
            transport_id: transport_id.clone(),
            created_at,
        },
    );
    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.producers.insert(
            producer_id.clone(),
            OwnedProducer {
                room: room_name.clone(),
                kind,
                created_at,
            },
        );
    }

    reply(
        state,
        client_id,
        ServerMessage::SfuProduced {
            producer_id: producer_id.clone(),
            kind,
        },
    )
    .await;

    let producer_user = state
        .clients
        .get(client_id)
        .and_then(|s| s.user.as_ref().map(|u| u.id.clone()));

    broadcast(
        state,
        &room_name,
        &ServerMessage::SfuNewProducer {
            room,
            producer_id,
            client_id: client_id.to_string(),
            producer_user,
            kind,
        },
        Some(client_id),
    )
    .await;
    Ok(())
}

async fn handle_consume(
    state: &AppState,
    client_id: &ClientId,
    transport_id: String,
    producer_id: String,
    rtp_capabilities: serde_json::Value,
    room: String,
) -> Result<(), SignalError> {
    let engine = require_engine(state)?;
    let room_name: RoomName = room.clone().into();

    let producer_exists = state
        .rooms
        .get(&room_name)
        .map(|r| r.producers.contains_key(&producer_id))
        .unwrap_or(false);
    if !producer_exists {
        return Err(SignalError::state("producer not found"));
    }

    let owns_transport = state
        .clients
        .get(client_id)
        .map(|s| s.transports.contains_key(&transport_id))
        .unwrap_or(false);
    if !owns_transport {
        return Err(SignalError::state("transport not found"));
    }

    let info = engine
        .consume(&room_name, client_id, &producer_id, rtp_capabilities)
        .await
        .map_err(engine_err("consume"))?;

    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.consumers.insert(
            info.id.clone(),
            OwnedConsumer {
                room: room_name,
                producer_id: info.producer_id.clone(),
            },
        );
    }

    reply(
        state,
        client_id,
        ServerMessage::SfuConsumed {
            consumer_id: info.id,
            producer_id: info.producer_id,
            kind: info.kind,
            rtp_parameters: info.rtp_parameters,
        },
    )
    .await;
    Ok(())
}

async fn handle_list_producers(
    state: &AppState,
    client_id: &ClientId,
    room: String,
) -> Result<(), SignalError> {
    require_engine(state)?;
    let room_name: RoomName = room.clone().into();
    if state.rooms.get(&room_name).is_none() {
        return Err(SignalError::state("room does not exist"));
    }
    let producers = producer_summaries(state, &room_name);
    reply(state, client_id, ServerMessage::SfuProducers { room, producers }).await;
    Ok(())
}

async fn handle_close_producer(
    state: &AppState,
    client_id: &ClientId,
    producer_id: String,
) -> Result<(), SignalError> {
    let engine = require_engine(state)?;
    let room_name = {
        let session = state
            .clients
            .get(client_id)
            .ok_or_else(|| SignalError::state("client not found"))?;
        session
            .producers
            .get(&producer_id)
            .map(|p| p.room.clone())
            .ok_or_else(|| SignalError::state("producer not found"))?
    };

    engine.close_producer_silent(&room_name, client_id, &producer_id);
    state.rooms.remove_producer(&room_name, &producer_id);
    if let Some(mut session) = state.clients.get_mut(client_id) {
        session.producers.remove(&producer_id);
    }

    reply(
        state,
        client_id,
        ServerMessage::SfuProducerClosed {
            room: room_name.to_string(),
            producer_id: producer_id.clone(),
            client_id: client_id.to_string(),
        },
    )
    .await;

    broadcast(
        state,
        &room_name,
        &ServerMessage::SfuProducerClosed {
            room: room_name.to_string(),
            producer_id,
            client_id: client_id.to_string(),
        },
        Some(client_id),
    )
    .await;
    Ok(())
}

async fn handle_start_recording(
    state: &AppState,
    client_id: &ClientId,
    room: String,
    producer_id: String,
) -> Result<(), SignalError> {
    require_moderator(state, client_id, &room)?;
    let room_name: RoomName = room.clone().into();
    if state
        .rooms
        .get(&room_name)
        .map(|r| !r.producers.contains_key(&producer_id))
        .unwrap_or(true)
    {
        return Err(SignalError::state("producer not found"));
    }

    let response = state
        .recorder
        .start(
            &producer_id,
            crate::recorder::RtpTapParams {
                ip: "127.0.0.1",
                port: 0,
                codec: "vp8",
                payload_type: 96,
                ssrc: 0,
            },
        )
        .await
        .map_err(|e| SignalError::engine(format!("recorder.start failed: {e}")))?;

    if let Some(mut room_ref) = state.rooms.get_mut(&room_name) {
        room_ref.recording_active = true;
    }

    reply(
        state,
        client_id,
        ServerMessage::RecordingStarted {
            room: room.clone(),
            producer_id: producer_id.clone(),
            output_file: response.output_file,
        },
    )
    .await;

    broadcast(
        state,
        &room_name,
        &ServerMessage::RecordingStartedBroadcast { room, producer_id },
        None,
    )
    .await;
    Ok(())
}

async fn handle_stop_recording(
    state: &AppState,
    client_id: &ClientId,
    room: String,
    producer_id: String,
) -> Result<(), SignalError> {
    require_moderator(state, client_id, &room)?;
    let room_name: RoomName = room.clone().into();

    state
        .recorder
        .stop(&producer_id)
        .await
        .map_err(|e| SignalError::engine(format!("recorder.stop failed: {e}")))?;

    if let Some(mut room_ref) = state.rooms.get_mut(&room_name) {
        room_ref.recording_active = false;
    }

    reply(
        state,
        client_id,
        ServerMessage::RecordingStopped {
            room: room.clone(),
            producer_id: producer_id.clone(),
        },
    )
    .await;

    broadcast(
        state,
        &room_name,
        &ServerMessage::RecordingStoppedBroadcast { room, producer_id },
        None,
    )
    .await;
    Ok(())
}

async fn handle_admin_rooms(state: &AppState, client_id: &ClientId) -> Result<(), SignalError> {
    require_admin(state, client_id)?;
    let rooms = state
        .rooms
        .room_names()
        .into_iter()
        .filter_map(|name| {
            state.rooms.get(&name).map(|room| RoomSummary {
                name: name.to_string(),
                count: room.member_roles.len(),
            })
        })
        .collect();
    reply(state, client_id, ServerMessage::AdminRooms { rooms }).await;
    Ok(())
}

async fn handle_admin_room_info(
    state: &AppState,
    client_id: &ClientId,
    room: String,
) -> Result<(), SignalError> {
    require_admin(state, client_id)?;
    let room_name: RoomName = room.clone().into();
    let room_ref = state
        .rooms
        .get(&room_name)
        .ok_or_else(|| SignalError::state("room does not exist"))?;

    let members = room_ref.member_roles.keys().map(|c| c.to_string()).collect();
    let owner_id = room_ref.owner_id.as_ref().map(|c| c.to_string());
    let producers = room_ref
        .producers
        .values()
        .map(|p| ProducerSummary {
            producer_id: p.id.clone(),
            kind: p.kind,
            client_id: p.owner.to_string(),
        })
        .collect();
    drop(room_ref);

    reply(
        state,
        client_id,
        ServerMessage::AdminRoomInfo {
            room,
            members,
            owner_id,
            producers,
        },
    )
    .await;
    Ok(())
}

async fn handle_admin_metrics(state: &AppState, client_id: &ClientId) -> Result<(), SignalError> {
    require_admin(state, client_id)?;
    let metrics = serde_json::json!({
        "clients": state.clients.len(),
        "rooms": state.rooms.room_count(),
        "engine": state.engine.as_ref().map(|e| e.metrics()),
    });
    reply(state, client_id, ServerMessage::AdminMetrics { metrics }).await;
    Ok(())
}

fn current_role(state: &AppState, client_id: &ClientId, room: &str) -> Result<Role, SignalError> {
    let room_name: RoomName = room.to_string().into();
    state
        .rooms
        .get(&room_name)
        .and_then(|r| r.member_roles.get(client_id).copied())
        .ok_or_else(|| SignalError::state("not a member of this room"))
}

fn require_admin(state: &AppState, client_id: &ClientId) -> Result<(), SignalError> {
    let is_admin = state.clients.get(client_id).map(|s| s.is_admin()).unwrap_or(false);
    if is_admin {
        Ok(())
    } else {
        Err(SignalError::policy("admin access required"))
    }
}

fn require_moderator(state: &AppState, client_id: &ClientId, room: &str) -> Result<(), SignalError> {
    let role = current_role(state, client_id, room)?;
    if role.is_moderator() {
        Ok(())
    } else {
        Err(SignalError::policy("moderator access required"))
    }
}

fn producer_summaries(state: &AppState, room: &RoomName) -> Vec<ProducerSummary> {
    state
        .rooms
        .get(room)
        .map(|r| {
            r.producers
                .values()
                .map(|p| ProducerSummary {
                    producer_id: p.id.clone(),
                    kind: p.kind,
                    client_id: p.owner.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Closes every producer this client owns within `room` before it leaves
/// (spec.md §4.1 `closeResources`, §4.2 `closeClientProducers`). Failures
/// are logged, never propagated — cleanup is best-effort (spec.md §4.2).
async fn close_client_producers_in_room(state: &AppState, client_id: &ClientId, room: &RoomName) {
    let producer_ids = state
        .clients
        .get(client_id)
        .map(|s| s.producers_in(room))
        .unwrap_or_default();

    if let Some(engine) = state.engine.as_ref() {
        for producer_id in &producer_ids {
            engine.close_producer(room, client_id, producer_id);
        }
    }
    if let Some(mut room_ref) = state.rooms.get_mut(room) {
        for producer_id in &producer_ids {
            room_ref.producers.remove(producer_id);
        }
    }
    if let Some(mut session) = state.clients.get_mut(client_id) {
        for producer_id in &producer_ids {
            session.producers.remove(producer_id);
        }
    }
}

fn engine_err(op: &'static str) -> impl Fn(relaymesh_media::EngineError) -> SignalError {
    move |e| {
        warn!(op, error = %e, "engine operation failed");
        SignalError::engine(format!("sfu.{op} failed"))
    }
}
