pub mod auth;
pub mod error;
pub mod recorder;
pub mod routes;
pub mod state;
pub mod ws;

use axum::routing::get;
use axum::Router;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_routes = Router::new()
        .route("/rooms", get(routes::admin::rooms))
        .route("/room/{name}", get(routes::admin::room_info))
        .route("/metrics", get(routes::admin::metrics));

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::handler::ws_upgrade))
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
