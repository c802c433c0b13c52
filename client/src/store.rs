use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use pitwatch_shared::fleet::{jitter, random_walk};
use pitwatch_shared::{
    Asset, AssetStatus, DEFAULT_TRAIL_CAP, POSITION_SAMPLE_KEY, Position, PushMessage, Telemetry,
    TelemetryValue, TimeseriesData,
};
use rand::Rng;
use tracing::trace;

/// Telemetry keys that carry the asset's map position rather than a metric.
pub const POSITION_X_KEY: &str = "x";
pub const POSITION_Y_KEY: &str = "y";
/// Telemetry key that carries a status override.
pub const STATUS_KEY: &str = "status";

const PERCENT_METRICS: &[&str] = &["fuel", "load", "utilization", "battery"];

/// Shared handle used by every component that reads or mutates the store.
pub type SharedStore = Rc<RefCell<AssetStore>>;

/// Per-key numeric bounds applied when telemetry is merged.
#[derive(Debug, Clone)]
pub struct ClampPolicy {
    ranges: HashMap<String, (f64, f64)>,
}

impl Default for ClampPolicy {
    fn default() -> Self {
        let ranges = PERCENT_METRICS
            .iter()
            .map(|key| (key.to_string(), (0.0, 100.0)))
            .collect();
        Self { ranges }
    }
}

impl ClampPolicy {
    pub fn empty() -> Self {
        Self {
            ranges: HashMap::new(),
        }
    }

    pub fn with_range(mut self, key: &str, min: f64, max: f64) -> Self {
        self.ranges.insert(key.to_string(), (min.min(max), max.max(min)));
        self
    }

    pub fn apply(&self, key: &str, value: TelemetryValue) -> TelemetryValue {
        match (&value, self.ranges.get(key)) {
            (TelemetryValue::Number(n), Some(&(min, max))) => TelemetryValue::Number(n.clamp(min, max)),
            _ => value,
        }
    }
}

/// Random-walk tuning for offline mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Max per-axis movement in map units per tick.
    pub position_step: f64,
    /// Max metric change per tick, as a fraction of the current value.
    pub metric_jitter_ratio: f64,
    /// Floor for the metric change so zero-valued metrics still move.
    pub metric_jitter_min: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            position_step: 1.5,
            metric_jitter_ratio: 0.03,
            metric_jitter_min: 0.5,
        }
    }
}

/// One time-stamped value destined for an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub key: String,
    pub timestamp: i64,
    pub value: TelemetryValue,
}

impl Reading {
    pub fn new(key: impl Into<String>, timestamp: i64, value: impl Into<TelemetryValue>) -> Self {
        Self {
            key: key.into(),
            timestamp,
            value: value.into(),
        }
    }

    /// Latest reading per key from a push message.
    pub fn from_push(message: &PushMessage) -> Vec<Self> {
        message
            .latest()
            .map(|(key, ts, value)| Self::new(key, ts, value.clone()))
            .collect()
    }

    /// Latest reading per key from a REST time-series response.
    pub fn latest_of(data: &TimeseriesData) -> Vec<Self> {
        data.iter()
            .filter_map(|(key, samples)| {
                samples
                    .iter()
                    .max_by_key(|(ts, _)| *ts)
                    .map(|(ts, value)| Self::new(key.clone(), *ts, value.clone()))
            })
            .collect()
    }
}

/// Canonical table of live assets, in stable insertion order.
///
/// Every mutation touches one asset inside a single `&mut self` call, so a
/// reader holding a snapshot never sees a half-applied update.
#[derive(Debug, Clone)]
pub struct AssetStore {
    assets: Vec<Asset>,
    index: HashMap<String, usize>,
    trail_cap: usize,
    clamp: ClampPolicy,
    revision: u64,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAP)
    }
}

impl AssetStore {
    pub fn new(trail_cap: usize) -> Self {
        Self {
            assets: Vec::new(),
            index: HashMap::new(),
            trail_cap: trail_cap.max(1),
            clamp: ClampPolicy::default(),
            revision: 0,
        }
    }

    pub fn with_assets(assets: impl IntoIterator<Item = Asset>, trail_cap: usize) -> Self {
        let mut store = Self::new(trail_cap);
        for asset in assets {
            store.insert(asset);
        }
        store
    }

    pub fn with_clamp_policy(mut self, clamp: ClampPolicy) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn into_shared(self) -> SharedStore {
        Rc::new(RefCell::new(self))
    }

    /// Add an asset, or replace the one with the same id in place.
    pub fn insert(&mut self, mut asset: Asset) {
        asset.trail.truncate(self.trail_cap);
        match self.index.get(&asset.id) {
            Some(&idx) => self.assets[idx] = asset,
            None => {
                self.index.insert(asset.id.clone(), self.assets.len());
                self.assets.push(asset);
            }
        }
        self.revision = self.revision.wrapping_add(1);
    }

    /// Replace the whole table (session start).
    pub fn reset(&mut self, assets: impl IntoIterator<Item = Asset>) {
        self.assets.clear();
        self.index.clear();
        for asset in assets {
            self.insert(asset);
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn trail_cap(&self) -> usize {
        self.trail_cap
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.index.get(id).map(|&idx| &self.assets[idx])
    }

    /// Assets in store iteration order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn snapshot(&self) -> Vec<Asset> {
        self.assets.clone()
    }

    /// Merge `delta` into the asset's telemetry, stamped now.
    pub fn apply_telemetry(&mut self, asset_id: &str, delta: &Telemetry) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        let readings: Vec<Reading> = delta
            .iter()
            .map(|(key, value)| Reading::new(key.clone(), now, value.clone()))
            .collect();
        self.apply_readings(asset_id, &readings)
    }

    /// Move the asset and record the new position on its trail, stamped now.
    pub fn move_asset(&mut self, asset_id: &str, position: Position) -> bool {
        self.move_asset_at(asset_id, position, chrono::Utc::now().timestamp_millis())
    }

    pub fn move_asset_at(&mut self, asset_id: &str, position: Position, timestamp: i64) -> bool {
        let Some(&idx) = self.index.get(asset_id) else {
            return false;
        };
        let trail_cap = self.trail_cap;
        self.assets[idx].record_position(position, timestamp, trail_cap);
        self.revision = self.revision.wrapping_add(1);
        true
    }

    pub fn set_status(&mut self, asset_id: &str, status: AssetStatus) -> bool {
        let Some(&idx) = self.index.get(asset_id) else {
            return false;
        };
        self.assets[idx].status = status;
        self.revision = self.revision.wrapping_add(1);
        true
    }

    /// Apply time-stamped readings to one asset as a single step.
    ///
    /// `x`/`y` move the asset, `status` overrides its status, every other key
    /// merges into telemetry through the clamp policy. A reading older than the
    /// value already held for its key is dropped, since delivery order is not
    /// origin order across reconnects. Returns `false` for unknown ids or when
    /// nothing was applied.
    pub fn apply_readings(&mut self, asset_id: &str, readings: &[Reading]) -> bool {
        let Some(&idx) = self.index.get(asset_id) else {
            trace!(asset_id, "ignoring telemetry for unknown asset");
            return false;
        };
        let trail_cap = self.trail_cap;
        let asset = &mut self.assets[idx];

        let mut applied = false;
        let mut next_x: Option<(i64, f64)> = None;
        let mut next_y: Option<(i64, f64)> = None;

        for reading in readings {
            match reading.key.as_str() {
                POSITION_X_KEY => {
                    if let Some(v) = reading.value.as_f64() {
                        next_x = newest(next_x, reading.timestamp, v);
                    }
                }
                POSITION_Y_KEY => {
                    if let Some(v) = reading.value.as_f64() {
                        next_y = newest(next_y, reading.timestamp, v);
                    }
                }
                key => {
                    if is_stale(asset.sample_times.get(key), reading.timestamp) {
                        trace!(asset_id, key, ts = reading.timestamp, "dropping stale reading");
                        continue;
                    }
                    if key == STATUS_KEY
                        && let Some(status) = reading.value.as_str().and_then(AssetStatus::parse)
                    {
                        asset.status = status;
                    } else {
                        let value = self.clamp.apply(key, reading.value.clone());
                        asset.telemetry.insert(key.to_string(), value);
                    }
                    asset.sample_times.insert(key.to_string(), reading.timestamp);
                    asset.last_update = asset.last_update.max(reading.timestamp);
                    applied = true;
                }
            }
        }

        if next_x.is_some() || next_y.is_some() {
            let ts = next_x
                .map(|(ts, _)| ts)
                .max(next_y.map(|(ts, _)| ts))
                .unwrap_or_default();
            if is_stale(asset.sample_times.get(POSITION_SAMPLE_KEY), ts) {
                trace!(asset_id, ts, "dropping stale position");
            } else {
                let position = Position::new(
                    next_x.map_or(asset.position.x, |(_, x)| x),
                    next_y.map_or(asset.position.y, |(_, y)| y),
                );
                asset.record_position(position, ts, trail_cap);
                applied = true;
            }
        }

        if applied {
            self.revision = self.revision.wrapping_add(1);
        }
        applied
    }

    /// Offline data source: random-walk every operational asset one step.
    /// Mobile assets move; numeric metrics jitter within their clamp bounds.
    /// Simulated values carry no origin time, so they never make a later
    /// reported reading look stale. Returns the number of assets touched.
    pub fn simulate_tick<R: Rng>(&mut self, rng: &mut R, params: &SimulationParams, now: i64) -> usize {
        let trail_cap = self.trail_cap;
        let mut touched = 0;
        for asset in &mut self.assets {
            if asset.status != AssetStatus::Operational {
                continue;
            }
            let next_position = asset
                .category
                .is_mobile()
                .then(|| random_walk(asset.position, params.position_step, rng));

            let deltas: Vec<(String, f64)> = asset
                .numeric_metrics()
                .map(|(key, value)| {
                    let amount = (value.abs() * params.metric_jitter_ratio).max(params.metric_jitter_min);
                    (key.to_string(), jitter(value, amount, rng).max(0.0))
                })
                .collect();

            if let Some(position) = next_position {
                asset.push_trail(position, now, trail_cap);
            }
            for (key, value) in deltas {
                let value = self.clamp.apply(&key, TelemetryValue::Number(value));
                asset.telemetry.insert(key, value);
            }
            asset.last_update = asset.last_update.max(now);
            touched += 1;
        }
        if touched > 0 {
            self.revision = self.revision.wrapping_add(1);
        }
        touched
    }
}

fn is_stale(held: Option<&i64>, incoming: i64) -> bool {
    held.is_some_and(|&held| incoming < held)
}

fn newest(current: Option<(i64, f64)>, ts: i64, value: f64) -> Option<(i64, f64)> {
    match current {
        Some((held, _)) if held > ts => current,
        _ => Some((ts, value)),
    }
}
