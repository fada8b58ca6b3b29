use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// HTTP-level errors for the admin surface (spec.md §6 "bearer or ?token=
/// auth with an admin principal"). Websocket errors go through
/// `relaymesh_core::SignalError` and never reach this type.
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "admin access required".to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        };
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}
