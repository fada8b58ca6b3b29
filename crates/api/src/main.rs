use relaymesh_api::{build_router, state::AppState};
use relaymesh_config::Settings;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaymesh_api=debug,relaymesh_media=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(port = settings.app.port, sfu_enabled = settings.sfu.enabled, "starting relaymesh");

    let state = AppState::new(settings.clone()).await?;
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
