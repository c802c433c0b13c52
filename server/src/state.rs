use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pitwatch_shared::fleet::baseline_metric;
use pitwatch_shared::{
    AttributeScope, Attributes, Device, TelemetryValue, TimeseriesData, demo_devices, demo_fleet,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::{
    DEFAULT_BROADCAST_BUFFER, DEFAULT_HISTORY_CAP, DEFAULT_PASSWORD, DEFAULT_SESSION_CAP,
    DEFAULT_USERNAME, broadcast_buffer, credentials, history_cap, session_cap,
};

pub const POSITION_X_KEY: &str = "x";
pub const POSITION_Y_KEY: &str = "y";
pub const STATUS_KEY: &str = "status";

/// Samples for one key, oldest first.
type Series = VecDeque<(i64, TelemetryValue)>;

/// Fresh samples for one device, shared by every push channel via Arc.
#[derive(Debug, Clone)]
pub struct TelemetrySample {
    pub device_id: String,
    pub data: Arc<TimeseriesData>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    /// Login order; the lowest is revoked first when the session cap is hit.
    pub serial: u64,
}

#[derive(Debug, Clone)]
pub struct StateSettings {
    pub username: String,
    pub password: String,
    pub broadcast_buffer: usize,
    pub history_cap: usize,
    pub session_cap: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
            history_cap: DEFAULT_HISTORY_CAP,
            session_cap: DEFAULT_SESSION_CAP,
        }
    }
}

impl StateSettings {
    pub fn from_env() -> Self {
        let (username, password) = credentials();
        Self {
            username,
            password,
            broadcast_buffer: broadcast_buffer(),
            history_cap: history_cap(),
            session_cap: session_cap(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<DashMap<String, Device>>,
    /// Device id -> key -> bounded series.
    pub telemetry: Arc<DashMap<String, HashMap<String, Series>>>,
    pub attributes: Arc<DashMap<(String, AttributeScope), Attributes>>,
    /// Bearer token -> session.
    pub sessions: Arc<DashMap<String, Session>>,
    login_serial: Arc<AtomicU64>,
    pub event_tx: broadcast::Sender<TelemetrySample>,
    pub settings: Arc<StateSettings>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_settings(StateSettings::from_env())
    }

    /// Empty state; call [`AppState::seed_demo_fleet`] to populate it.
    pub fn with_settings(settings: StateSettings) -> Self {
        let (event_tx, _) = broadcast::channel(settings.broadcast_buffer.max(1));
        Self {
            devices: Arc::new(DashMap::new()),
            telemetry: Arc::new(DashMap::new()),
            attributes: Arc::new(DashMap::new()),
            sessions: Arc::new(DashMap::new()),
            login_serial: Arc::new(AtomicU64::new(0)),
            event_tx,
            settings: Arc::new(settings),
        }
    }

    /// Register the demo site: devices, server-scope position and status,
    /// and one baseline sample per metric.
    pub fn seed_demo_fleet(&self, now_ms: i64) {
        for device in demo_devices() {
            self.devices.insert(device.id.clone(), device);
        }

        for asset in demo_fleet() {
            let attributes: Attributes = [
                (POSITION_X_KEY.to_string(), TelemetryValue::Number(asset.position.x)),
                (POSITION_Y_KEY.to_string(), TelemetryValue::Number(asset.position.y)),
                (STATUS_KEY.to_string(), TelemetryValue::from(asset.status.as_str())),
            ]
            .into_iter()
            .collect();
            self.attributes
                .insert((asset.id.clone(), AttributeScope::Server), attributes);

            let mut data = TimeseriesData::new();
            data.insert(
                POSITION_X_KEY.to_string(),
                vec![(now_ms, TelemetryValue::Number(asset.position.x))],
            );
            data.insert(
                POSITION_Y_KEY.to_string(),
                vec![(now_ms, TelemetryValue::Number(asset.position.y))],
            );
            for key in asset.category.metric_keys() {
                data.insert(
                    key.to_string(),
                    vec![(now_ms, TelemetryValue::Number(baseline_metric(key)))],
                );
            }
            self.store_samples(&asset.id, &data);
        }
    }

    /// Issue a fresh token when the credentials match. At the session cap
    /// the oldest token is revoked first.
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        if username != self.settings.username || password != self.settings.password {
            return None;
        }
        let cap = self.settings.session_cap.max(1);
        while self.sessions.len() >= cap {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().serial)
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else {
                break;
            };
            if let Some((_, revoked)) = self.sessions.remove(&oldest) {
                debug!(username = %revoked.username, issued_at = %revoked.issued_at, "session revoked at cap");
            }
        }

        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                issued_at: Utc::now(),
                serial: self.login_serial.fetch_add(1, Ordering::Relaxed),
            },
        );
        Some(token)
    }

    pub fn session(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    /// One page of devices in id order, optionally filtered by type.
    pub fn devices_page(&self, page_size: u32, page: u32, device_type: Option<&str>) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .devices
            .iter()
            .filter(|entry| {
                device_type.is_none_or(|wanted| entry.device_type.eq_ignore_ascii_case(wanted))
            })
            .map(|entry| entry.value().clone())
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));

        let page_size = page_size as usize;
        devices
            .into_iter()
            .skip(page_size.saturating_mul(page as usize))
            .take(page_size)
            .collect()
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Append samples to the device's series and broadcast them to push
    /// channels.
    pub fn record(&self, device_id: &str, data: TimeseriesData) {
        if data.is_empty() {
            return;
        }
        self.store_samples(device_id, &data);
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.event_tx.send(TelemetrySample {
            device_id: device_id.to_string(),
            data: Arc::new(data),
        });
    }

    /// Newest sample per key. Empty `keys` means every key. `None` for an
    /// unknown device.
    pub fn latest(&self, device_id: &str, keys: &[String]) -> Option<TimeseriesData> {
        if !self.has_device(device_id) {
            return None;
        }
        let mut out = TimeseriesData::new();
        if let Some(series) = self.telemetry.get(device_id) {
            for (key, samples) in series.iter() {
                if !wants(keys, key) {
                    continue;
                }
                if let Some(sample) = samples.back() {
                    out.insert(key.clone(), vec![sample.clone()]);
                }
            }
        }
        Some(out)
    }

    /// Samples with `start_ts <= ts <= end_ts`, newest last, keeping the
    /// newest `limit` per key.
    pub fn history(
        &self,
        device_id: &str,
        keys: &[String],
        start_ts: i64,
        end_ts: i64,
        limit: usize,
    ) -> Option<TimeseriesData> {
        if !self.has_device(device_id) {
            return None;
        }
        let mut out = TimeseriesData::new();
        if let Some(series) = self.telemetry.get(device_id) {
            for (key, samples) in series.iter() {
                if !wants(keys, key) {
                    continue;
                }
                let window: Vec<_> = samples
                    .iter()
                    .filter(|(ts, _)| (start_ts..=end_ts).contains(ts))
                    .cloned()
                    .collect();
                let skip = window.len().saturating_sub(limit);
                let window: Vec<_> = window.into_iter().skip(skip).collect();
                if !window.is_empty() {
                    out.insert(key.clone(), window);
                }
            }
        }
        Some(out)
    }

    pub fn attributes(&self, device_id: &str, scope: AttributeScope) -> Option<Attributes> {
        if !self.has_device(device_id) {
            return None;
        }
        Some(
            self.attributes
                .get(&(device_id.to_string(), scope))
                .map(|entry| entry.value().clone())
                .unwrap_or_default(),
        )
    }

    /// Merge `attributes` into the scope. Returns false for an unknown device.
    pub fn save_attributes(
        &self,
        device_id: &str,
        scope: AttributeScope,
        attributes: Attributes,
    ) -> bool {
        if !self.has_device(device_id) {
            return false;
        }
        self.attributes
            .entry((device_id.to_string(), scope))
            .or_default()
            .extend(attributes);
        true
    }

    fn store_samples(&self, device_id: &str, data: &TimeseriesData) {
        let cap = self.settings.history_cap.max(1);
        let mut series = self.telemetry.entry(device_id.to_string()).or_default();
        for (key, samples) in data {
            let ring = series.entry(key.clone()).or_default();
            for (ts, value) in samples {
                let at = ring.partition_point(|(existing, _)| existing <= ts);
                ring.insert(at, (*ts, value.clone()));
            }
            while ring.len() > cap {
                ring.pop_front();
            }
        }
    }
}

fn wants(keys: &[String], key: &str) -> bool {
    keys.is_empty() || keys.iter().any(|wanted| wanted == key)
}
