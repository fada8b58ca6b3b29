use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::StreamExt;
use relaymesh_core::{ClientId, ClientSession, ClientSink, SignalError};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::state::AppState;

use super::protocol::{ClientMessage, ServerMessage};
use super::sink::AxumSink;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Always completes the upgrade; auth is validated once the channel is open
/// (spec.md §4.5's state machine starts every session `unauthenticated` and
/// transitions from there — a bad token is reported with an `error` frame
/// over the socket, not by refusing the HTTP upgrade, per spec.md §6).
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let client_id = ClientId::new();
    info!(%client_id, "client connected");

    let (raw_sink, mut receiver) = socket.split();
    let sink = AxumSink::new(raw_sink);

    let user = if state.auth.enabled() {
        match token.as_deref().and_then(|t| state.auth.validate_token(t)) {
            Some(user) => Some(user),
            None => {
                warn!(%client_id, "closing channel: missing or invalid token");
                let err = SignalError::auth("unauthorized");
                sink.send_text(ServerMessage::error(err.message()).to_text()).await;
                sink.close().await;
                return;
            }
        }
    } else {
        token.as_deref().and_then(|t| state.auth.validate_token(t))
    };

    let session = ClientSession::new(client_id.clone(), user, Box::new(sink));
    state.clients.register(session);

    relaymesh_core::fanout::send_to_client(
        &state.clients,
        &client_id,
        &ServerMessage::Id {
            id: client_id.to_string(),
        }
        .to_text(),
    )
    .await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(&state, &client_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Err(e) => {
                warn!(%client_id, %e, "websocket error");
                break;
            }
        }

        if state
            .clients
            .get(&client_id)
            .map(|s| s.sink.is_closed())
            .unwrap_or(true)
        {
            break;
        }
    }

    disconnect(&state, &client_id).await;
    info!(%client_id, "client disconnected");
}

async fn handle_text(state: &AppState, client_id: &ClientId, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(%client_id, %e, "dropping unrecognized message");
            relaymesh_core::fanout::send_to_client(
                &state.clients,
                client_id,
                &ServerMessage::error("unrecognized message").to_text(),
            )
            .await;
            return;
        }
    };
    super::session::dispatch(state, client_id, message).await;
}

/// Full teardown for one client: closes every resource it held in every
/// room it was in (spec.md §4.4's disconnect path), then removes it from
/// the Client Registry and announces the departure process-wide.
async fn disconnect(state: &AppState, client_id: &ClientId) {
    let rooms: Vec<relaymesh_core::RoomName> = state
        .clients
        .get(client_id)
        .map(|s| s.rooms.iter().cloned().collect())
        .unwrap_or_default();

    for room in rooms {
        let producer_ids = state
            .clients
            .get(client_id)
            .map(|s| s.producers_in(&room))
            .unwrap_or_default();

        if let Some(engine) = state.engine.as_ref() {
            for producer_id in &producer_ids {
                engine.close_producer(&room, client_id, producer_id);
            }
            engine.remove_participant(&room, client_id);
        }

        state.rooms.remove_member(&room, client_id);

        relaymesh_core::fanout::broadcast_to_room(
            &state.clients,
            &state.rooms,
            &room,
            &ServerMessage::MemberLeft {
                room: room.to_string(),
                id: client_id.to_string(),
            }
            .to_text(),
            Some(client_id),
        )
        .await;

        state.rooms.delete_if_empty(&room);
    }

    state.clients.unregister(client_id);

    let remaining = state.clients.ids();
    let leave = ServerMessage::Leave {
        id: client_id.to_string(),
    }
    .to_text();
    for id in remaining {
        relaymesh_core::fanout::send_to_client(&state.clients, &id, &leave).await;
    }
}
