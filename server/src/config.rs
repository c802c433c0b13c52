use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_USERNAME: &str = "operator@pitwatch.local";
pub const DEFAULT_PASSWORD: &str = "pitwatch";
pub const DEFAULT_SIM_TICK_MS: u64 = 1_000;
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_HISTORY_CAP: usize = 500;
pub const DEFAULT_SESSION_CAP: usize = 64;

pub const MAX_DEVICE_PAGE_SIZE: u32 = 1_000;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// Simulator
pub const SIM_POSITION_STEP: f64 = 1.5;
pub const SIM_METRIC_JITTER: f64 = 0.04;

pub fn server_port() -> u16 {
    std::env::var("PITWATCH_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Accepted login as `(username, password)`.
pub fn credentials() -> (String, String) {
    (
        env_string("PITWATCH_USERNAME", DEFAULT_USERNAME),
        env_string("PITWATCH_PASSWORD", DEFAULT_PASSWORD),
    )
}

pub fn sim_tick() -> Duration {
    std::env::var("PITWATCH_SIM_TICK_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_SIM_TICK_MS))
}

pub fn broadcast_buffer() -> usize {
    std::env::var("PITWATCH_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

/// Samples retained per device and key.
pub fn history_cap() -> usize {
    std::env::var("PITWATCH_HISTORY_CAP")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_HISTORY_CAP)
}

/// Live login tokens kept before the oldest is revoked.
pub fn session_cap() -> usize {
    std::env::var("PITWATCH_SESSION_CAP")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SESSION_CAP)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
