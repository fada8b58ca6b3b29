use std::net::SocketAddr;

use relaymesh_api::state::AppState;
use relaymesh_api::build_router;
use relaymesh_config::{
    AppSettings, AuthSettings, IceServer, RecorderSettings, RoomDefaults, Settings, SfuSettings,
    TurnSettings,
};
use tokio::net::TcpListener;

/// A running test server bound to an ephemeral port, driven over real
/// WebSocket connections — same "spawn a live `axum::serve` instance,
/// hand back its address" shape as the teacher's HTTP-oriented `TestApp`,
/// adapted for a signaling protocol instead of a REST one.
pub struct TestApp {
    pub addr: SocketAddr,
}

impl TestApp {
    /// Spawns with the media engine disabled. Sufficient for every scenario
    /// that only exercises join/leave/role/admin signaling — no real
    /// `mediasoup` worker is started, so this works in any CI sandbox.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let state = AppState::new(settings)
            .await
            .expect("AppState::new should succeed in test harness");
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr }
    }

    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(t) => format!("ws://{}/ws?token={}", self.addr, t),
            None => format!("ws://{}/ws", self.addr),
        }
    }
}

fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            port: 0,
            admin_port: 0,
        },
        auth: AuthSettings {
            enable_auth: false,
            jwt_secret: "test-secret".to_string(),
        },
        sfu: SfuSettings {
            enabled: false,
            num_workers: 1,
            bind_ip: "127.0.0.1".to_string(),
            public_ip: None,
            rtc_min_port: 40000,
            rtc_max_port: 40100,
            listen_ips: vec![],
        },
        turn: TurnSettings {
            host: None,
            port: None,
            username: None,
            password: None,
        },
        room: RoomDefaults {
            max_video_producers: 2,
            allow_observers: true,
            max_observers: 0,
        },
        recorder: RecorderSettings {
            api_url: None,
            auto_start: false,
        },
        ice_servers: Vec::<IceServer>::new(),
    }
}

/// A signed HS256 token usable against `test_settings()`'s `jwt_secret`,
/// optionally carrying the `admin` role (spec.md §6 moderator/admin gate).
pub fn make_token(subject: &str, admin: bool) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        name: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<&'a str>,
    }

    let claims = Claims {
        sub: subject,
        name: subject,
        role: if admin { Some("admin") } else { None },
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret"))
        .expect("token encoding should not fail")
}
