use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use relaymesh_core::AuthenticatedUser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Validates bearer tokens against a shared secret and reports the
/// authenticated principal. This is the in-process stand-in for the Auth
/// Provider external collaborator (spec.md §1, §6): `validateToken(token) ->
/// User | None`. There is no registration/login surface here — issuing
/// tokens is someone else's job, same as the spec's "out of scope" framing.
pub struct AuthService {
    decoding_key: DecodingKey,
    enabled: bool,
}

impl AuthService {
    pub fn new(secret: &str, enabled: bool) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `None` for a missing/invalid token, never an error — callers
    /// decide whether that's acceptable (spec.md §6: "When ENABLE_AUTH == 1
    /// a missing/invalid token causes an error and channel close").
    pub fn validate_token(&self, token: &str) -> Option<AuthenticatedUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256)).ok()?;
        Some(AuthenticatedUser {
            id: data.claims.sub,
            name: data.claims.name.unwrap_or_default(),
            is_admin: data.claims.role.as_deref() == Some("admin"),
        })
    }
}
