use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid JSON in {0}: {1}")]
    Json(&'static str, serde_json::Error),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub auth: AuthSettings,
    pub sfu: SfuSettings,
    pub turn: TurnSettings,
    pub room: RoomDefaults,
    pub recorder: RecorderSettings,
    /// Parsed separately from `ICE_SERVERS` (a JSON blob), not from the
    /// layered config sources below — see `Settings::load`.
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub port: u16,
    pub admin_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub enable_auth: bool,
    /// Shared HMAC secret for validating bearer tokens. The Auth Provider
    /// itself is out of scope (spec.md §1) — this is only the key needed to
    /// check a token it issued.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SfuSettings {
    /// Feature flag for the whole `sfu.*`/media-engine surface. When false,
    /// no mediasoup workers are spawned and `sfu.*` messages fail fast with
    /// "sfu not enabled" (spec.md §4.4's "feature availability" check).
    pub enabled: bool,
    pub num_workers: u32,
    pub bind_ip: String,
    pub public_ip: Option<String>,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    /// Parsed separately from `SFU_LISTEN_IPS` (a JSON blob) — see `Settings::load`.
    #[serde(default)]
    pub listen_ips: Vec<ListenIp>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListenIp {
    pub ip: String,
    #[serde(rename = "announcedIp", alias = "announced_ip")]
    pub announced_ip: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TurnSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomDefaults {
    pub max_video_producers: u32,
    pub allow_observers: bool,
    pub max_observers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecorderSettings {
    pub api_url: Option<String>,
    /// Opt-in automatic recording of every video producer. Defaults to
    /// `false` per spec.md §9 — recording is explicit-message-only unless
    /// a deployment turns this on.
    pub auto_start: bool,
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().separator("__").prefix("RELAYMESH"))
            .set_default("app.port", 8080)?
            .set_default("app.admin_port", 8081)?
            .set_default("auth.enable_auth", false)?
            .set_default("auth.jwt_secret", "dev-secret-change-me")?
            .set_default("sfu.enabled", true)?
            .set_default("sfu.num_workers", num_cpus_default())?
            .set_default("sfu.bind_ip", "0.0.0.0")?
            .set_default("sfu.public_ip", None::<String>)?
            .set_default("sfu.rtc_min_port", 40000)?
            .set_default("sfu.rtc_max_port", 49999)?
            .set_default("turn.host", None::<String>)?
            .set_default("turn.port", None::<i64>)?
            .set_default("turn.username", None::<String>)?
            .set_default("turn.password", None::<String>)?
            .set_default("room.max_video_producers", 0)?
            .set_default("room.allow_observers", true)?
            .set_default("room.max_observers", 0)?
            .set_default("recorder.api_url", None::<String>)?
            .set_default("recorder.auto_start", false)?
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        // These two variables are JSON blobs, not `KEY__SUBKEY`-style env
        // vars, so the `Environment` source above can't parse them — they
        // are decoded by hand, same env-var names as spec.md §6.
        if let Ok(raw) = std::env::var("ICE_SERVERS") {
            if !raw.trim().is_empty() {
                settings.ice_servers =
                    serde_json::from_str(&raw).map_err(|e| SettingsError::Json("ICE_SERVERS", e))?;
            }
        }
        if let Ok(raw) = std::env::var("SFU_LISTEN_IPS") {
            if !raw.trim().is_empty() {
                settings.sfu.listen_ips = serde_json::from_str(&raw)
                    .map_err(|e| SettingsError::Json("SFU_LISTEN_IPS", e))?;
            }
        }
        if settings.sfu.listen_ips.is_empty() {
            settings.sfu.listen_ips.push(ListenIp {
                ip: settings.sfu.bind_ip.clone(),
                announced_ip: settings.sfu.public_ip.clone(),
            });
        }

        Ok(settings)
    }
}

fn num_cpus_default() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1) as i64)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        // SAFETY: single-threaded test, no concurrent env mutation.
        unsafe {
            std::env::remove_var("ICE_SERVERS");
            std::env::remove_var("SFU_LISTEN_IPS");
        }
        let settings = Settings::load().expect("defaults should always load");
        assert_eq!(settings.app.port, 8080);
        assert!(!settings.auth.enable_auth);
        assert_eq!(settings.sfu.listen_ips.len(), 1);
        assert_eq!(settings.room.max_video_producers, 0);
    }

    #[test]
    fn ice_servers_parses_json_blob() {
        unsafe {
            std::env::set_var(
                "ICE_SERVERS",
                r#"[{"urls":["stun:stun.example.com:19302"]}]"#,
            );
        }
        let settings = Settings::load().expect("should load with ICE_SERVERS set");
        assert_eq!(settings.ice_servers.len(), 1);
        assert_eq!(settings.ice_servers[0].urls[0], "stun:stun.example.com:19302");
        unsafe {
            std::env::remove_var("ICE_SERVERS");
        }
    }
}
