use std::sync::Arc;

use relaymesh_config::Settings;
use relaymesh_core::{ClientRegistry, RoomRegistry};
use relaymesh_media::EngineAdapter;

use crate::auth::AuthService;
use crate::recorder::RecorderClient;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub clients: Arc<ClientRegistry>,
    pub rooms: Arc<RoomRegistry>,
    /// `None` when `sfu.enabled = false` — every `sfu.*` message then fails
    /// fast with "sfu not enabled" (spec.md §4.4).
    pub engine: Option<Arc<EngineAdapter>>,
    pub auth: Arc<AuthService>,
    pub recorder: Arc<RecorderClient>,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let auth = Arc::new(AuthService::new(&settings.auth.jwt_secret, settings.auth.enable_auth));
        let recorder = Arc::new(RecorderClient::new(settings.recorder.api_url.clone()));

        let engine = if settings.sfu.enabled {
            let (engine, events_rx) = EngineAdapter::new(&settings.sfu).await?;
            Some((engine, events_rx))
        } else {
            None
        };

        let (engine, events_rx) = match engine {
            Some((engine, rx)) => (Some(engine), Some(rx)),
            None => (None, None),
        };

        let state = Self {
            settings: Arc::new(settings),
            clients: Arc::new(ClientRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
            engine,
            auth,
            recorder,
        };

        if let Some(events_rx) = events_rx {
            crate::ws::bridge::spawn(state.clone(), events_rx);
        }

        Ok(state)
    }
}
