use std::time::Duration;

use pitwatch_shared::DEFAULT_TRAIL_CAP;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/api/ws";
pub const DEFAULT_USERNAME: &str = "operator@pitwatch.local";
pub const DEFAULT_PASSWORD: &str = "pitwatch";

pub const DEFAULT_AUTH_MAX_RETRIES: u32 = 3;
pub const DEFAULT_AUTH_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 500;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
pub const DEFAULT_UPDATE_TICK_MS: u64 = 2_000;
pub const DEFAULT_FRAME_MS: u64 = 16;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DEVICE_PAGE_SIZE: u32 = 100;
pub const SUMMARY_LOG_SECS: u64 = 5;

/// Login credentials for the telemetry backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Retry and reconnect tuning for [`crate::telemetry::TelemetryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub max_retries: u32,
    /// Login retry delay grows linearly: `attempt * auth_backoff_step`.
    pub auth_backoff_step: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_AUTH_MAX_RETRIES,
            auth_backoff_step: Duration::from_millis(DEFAULT_AUTH_BACKOFF_MS),
            reconnect_base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            max_retries: auth_max_retries(),
            auth_backoff_step: env_millis("PITWATCH_AUTH_BACKOFF_MS", DEFAULT_AUTH_BACKOFF_MS),
            reconnect_base: env_millis("PITWATCH_RECONNECT_BASE_MS", DEFAULT_RECONNECT_BASE_MS),
            reconnect_max: env_millis("PITWATCH_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS),
        }
    }
}

/// Everything the headless runner needs, resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub ws_url: String,
    pub credentials: Credentials,
    pub client: ClientConfig,
    pub update_tick: Duration,
    pub frame_interval: Duration,
    pub trail_cap: usize,
    pub http_timeout: Duration,
    pub device_page_size: u32,
    /// `None` runs until Ctrl+C.
    pub run_for: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env_string("PITWATCH_API_URL", DEFAULT_API_URL),
            ws_url: env_string("PITWATCH_WS_URL", DEFAULT_WS_URL),
            credentials: Credentials::new(
                env_string("PITWATCH_USERNAME", DEFAULT_USERNAME),
                env_string("PITWATCH_PASSWORD", DEFAULT_PASSWORD),
            ),
            client: ClientConfig::from_env(),
            update_tick: env_millis("PITWATCH_UPDATE_TICK_MS", DEFAULT_UPDATE_TICK_MS),
            frame_interval: env_millis("PITWATCH_FRAME_MS", DEFAULT_FRAME_MS),
            trail_cap: trail_cap(),
            http_timeout: std::env::var("PITWATCH_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            device_page_size: std::env::var("PITWATCH_DEVICE_PAGE_SIZE")
                .ok()
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_DEVICE_PAGE_SIZE),
            run_for: std::env::var("PITWATCH_RUN_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .map(Duration::from_secs),
        }
    }
}

pub fn auth_max_retries() -> u32 {
    std::env::var("PITWATCH_AUTH_MAX_RETRIES")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_AUTH_MAX_RETRIES)
}

pub fn trail_cap() -> usize {
    std::env::var("PITWATCH_TRAIL_CAP")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_TRAIL_CAP)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        temp_env::with_vars_unset(
            [
                "PITWATCH_AUTH_MAX_RETRIES",
                "PITWATCH_TRAIL_CAP",
                "PITWATCH_API_URL",
                "PITWATCH_RUN_SECS",
            ],
            || {
                let config = AppConfig::from_env();
                assert_eq!(config.client.max_retries, 3);
                assert_eq!(config.trail_cap, 20);
                assert_eq!(config.api_url, DEFAULT_API_URL);
                assert_eq!(config.run_for, None);
            },
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        temp_env::with_vars(
            [
                ("PITWATCH_AUTH_MAX_RETRIES", Some("0")),
                ("PITWATCH_TRAIL_CAP", Some("lots")),
                ("PITWATCH_UPDATE_TICK_MS", Some("-5")),
                ("PITWATCH_USERNAME", Some("   ")),
            ],
            || {
                let config = AppConfig::from_env();
                assert_eq!(config.client.max_retries, DEFAULT_AUTH_MAX_RETRIES);
                assert_eq!(config.trail_cap, DEFAULT_TRAIL_CAP);
                assert_eq!(
                    config.update_tick,
                    Duration::from_millis(DEFAULT_UPDATE_TICK_MS)
                );
                assert_eq!(config.credentials.username, DEFAULT_USERNAME);
            },
        );
    }

    #[test]
    fn overrides_are_read() {
        temp_env::with_vars(
            [
                ("PITWATCH_AUTH_MAX_RETRIES", Some("5")),
                ("PITWATCH_RECONNECT_MAX_MS", Some("2500")),
                ("PITWATCH_RUN_SECS", Some("30")),
                ("PITWATCH_WS_URL", Some("ws://pit.example/ws")),
            ],
            || {
                let config = AppConfig::from_env();
                assert_eq!(config.client.max_retries, 5);
                assert_eq!(config.client.reconnect_max, Duration::from_millis(2500));
                assert_eq!(config.run_for, Some(Duration::from_secs(30)));
                assert_eq!(config.ws_url, "ws://pit.example/ws");
            },
        );
    }
}
