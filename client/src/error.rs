use thiserror::Error;

use crate::telemetry::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// Bad credentials, missing token, or login retries exhausted.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// A REST call failed in transport or returned a non-success status.
    #[error("network error: {0}")]
    Network(String),
    /// The push channel could not be opened, or closed underneath us.
    #[error("channel error: {0}")]
    Channel(String),
    /// A command could not be sent because the channel is not open.
    /// The registration survives and is replayed on the next open.
    #[error("subscription {cmd_id} deferred: {reason}")]
    Subscription { cmd_id: String, reason: String },
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("invalid connection transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl From<reqwest::Error> for TelemetryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        match e.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                Self::Auth(format!("HTTP {status}"))
            }
            _ => Self::Network(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
