use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminAuthParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Pulls the bearer token out of an `Authorization: Bearer <token>` header,
/// if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Shared entry check for every `/admin/*` route (spec.md §6: "bearer or
/// `?token=` auth with an admin principal"). The header takes precedence
/// when both are present.
fn require_admin(state: &AppState, headers: &HeaderMap, params: &AdminAuthParams) -> Result<(), ApiError> {
    let token = bearer_token(headers).or(params.token.as_deref());
    let user = token
        .and_then(|t| state.auth.validate_token(t))
        .ok_or(ApiError::Unauthorized)?;
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub async fn rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AdminAuthParams>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers, &params)?;
    let rooms: Vec<Value> = state
        .rooms
        .room_names()
        .into_iter()
        .filter_map(|name| {
            state.rooms.get(&name).map(|room| {
                json!({
                    "name": name.to_string(),
                    "count": room.member_roles.len(),
                    "ownerId": room.owner_id.as_ref().map(|c| c.to_string()),
                })
            })
        })
        .collect();
    Ok(Json(json!({ "rooms": rooms })))
}

pub async fn room_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AdminAuthParams>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers, &params)?;
    let room_name = name.into();
    let room = state
        .rooms
        .get(&room_name)
        .ok_or_else(|| ApiError::NotFound("room does not exist".to_string()))?;

    let members: Vec<Value> = room
        .member_roles
        .iter()
        .map(|(id, role)| json!({ "id": id.to_string(), "role": role }))
        .collect();
    let producers: Vec<Value> = room
        .producers
        .values()
        .map(|p| {
            json!({
                "producerId": p.id,
                "kind": p.kind,
                "clientId": p.owner.to_string(),
                "createdAt": p.created_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "name": room.name.to_string(),
        "ownerId": room.owner_id.as_ref().map(|c| c.to_string()),
        "members": members,
        "producers": producers,
        "recordingActive": room.recording_active,
    })))
}

pub async fn metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AdminAuthParams>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers, &params)?;
    Ok(Json(json!({
        "clients": state.clients.len(),
        "rooms": state.rooms.room_count(),
        "engine": state.engine.as_ref().map(|e| e.metrics()),
    })))
}
