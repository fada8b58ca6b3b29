use thiserror::Error;

/// Mirrors the five error categories of spec.md §7; the wire-level mapping
/// to `{type:"error", message}` frames lives in `relaymesh-api`.
#[derive(Debug, Error, Clone)]
pub enum SignalError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("state: {0}")]
    State(String),

    #[error("policy: {0}")]
    Policy(String),

    #[error("engine: {0}")]
    Engine(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("auth: {0}")]
    Auth(String),
}

impl SignalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether this error should also close the signaling channel, per
    /// spec.md §7 ("Auth errors close the connection; all other categories
    /// reply in-band and leave the session open").
    pub fn closes_channel(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
