use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower and upper bound of normalized map space on both axes.
pub const MAP_MIN: f64 = 0.0;
pub const MAP_MAX: f64 = 100.0;

/// Default number of trail points retained per asset.
pub const DEFAULT_TRAIL_CAP: usize = 20;

/// Key under which the origin timestamp of the current position is tracked.
pub const POSITION_SAMPLE_KEY: &str = "position";

pub type Telemetry = BTreeMap<String, TelemetryValue>;

/// A single telemetry reading: either numeric or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Text(String),
}

impl TelemetryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e12 => {
                write!(f, "{value:.0}")
            }
            Self::Number(value) => write!(f, "{value:.1}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for TelemetryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TelemetryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into normalized map space.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(MAP_MIN, MAP_MAX),
            y: self.y.clamp(MAP_MIN, MAP_MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Hauler,
    Excavator,
    Drill,
    Conveyor,
    ProcessingUnit,
    Dozer,
    LightVehicle,
}

impl AssetCategory {
    /// Map a backend device type onto a category. Unknown types become light vehicles.
    pub fn from_device_type(device_type: &str) -> Self {
        let normalized = device_type.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "hauler" | "haul-truck" | "truck" => Self::Hauler,
            "excavator" | "shovel" => Self::Excavator,
            "drill" | "drill-rig" => Self::Drill,
            "conveyor" => Self::Conveyor,
            "processing-unit" | "crusher" | "plant" => Self::ProcessingUnit,
            "dozer" | "bulldozer" => Self::Dozer,
            _ => Self::LightVehicle,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hauler => "hauler",
            Self::Excavator => "excavator",
            Self::Drill => "drill",
            Self::Conveyor => "conveyor",
            Self::ProcessingUnit => "processing-unit",
            Self::Dozer => "dozer",
            Self::LightVehicle => "light-vehicle",
        }
    }

    /// Single-character marker glyph.
    pub const fn glyph(self) -> char {
        match self {
            Self::Hauler => 'H',
            Self::Excavator => 'E',
            Self::Drill => 'D',
            Self::Conveyor => 'C',
            Self::ProcessingUnit => 'P',
            Self::Dozer => 'Z',
            Self::LightVehicle => 'L',
        }
    }

    /// Whether assets of this category move around the pit.
    pub const fn is_mobile(self) -> bool {
        !matches!(self, Self::Conveyor | Self::ProcessingUnit)
    }

    /// Telemetry keys reported by assets of this category.
    pub const fn metric_keys(self) -> &'static [&'static str] {
        match self {
            Self::Hauler => &["speed", "fuel", "load", "engineTemp"],
            Self::Excavator => &["fuel", "utilization", "hydraulicPressure"],
            Self::Drill => &["depth", "fuel", "rpm"],
            Self::Conveyor => &["throughput", "utilization", "beltSpeed"],
            Self::ProcessingUnit => &["throughput", "utilization", "temperature"],
            Self::Dozer => &["speed", "fuel", "engineTemp"],
            Self::LightVehicle => &["speed", "battery"],
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Operational,
    Maintenance,
    Critical,
    Offline,
}

impl AssetStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "operational" | "active" | "online" => Some(Self::Operational),
            "maintenance" => Some(Self::Maintenance),
            "critical" | "alarm" => Some(Self::Critical),
            "offline" | "inactive" => Some(Self::Offline),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Maintenance => "maintenance",
            Self::Critical => "critical",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live entity on the site map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub display_name: String,
    pub category: AssetCategory,
    pub position: Position,
    pub status: AssetStatus,
    #[serde(default)]
    pub telemetry: Telemetry,
    /// Origin timestamp (epoch ms) of each telemetry value currently held,
    /// plus [`POSITION_SAMPLE_KEY`] for the position.
    #[serde(default)]
    pub sample_times: BTreeMap<String, i64>,
    pub last_update: i64,
    /// Most recent first.
    #[serde(default)]
    pub trail: VecDeque<TrailPoint>,
}

impl Asset {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        category: AssetCategory,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category,
            position: position.clamped(),
            status: AssetStatus::Operational,
            telemetry: Telemetry::new(),
            sample_times: BTreeMap::new(),
            last_update: 0,
            trail: VecDeque::new(),
        }
    }

    pub fn with_status(mut self, status: AssetStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metric(mut self, key: &str, value: impl Into<TelemetryValue>) -> Self {
        self.telemetry.insert(key.to_string(), value.into());
        self
    }

    /// Move to `position` and record it at the head of the trail, evicting the
    /// oldest points beyond `cap`.
    pub fn record_position(&mut self, position: Position, timestamp: i64, cap: usize) {
        self.push_trail(position, timestamp, cap);
        self.sample_times
            .insert(POSITION_SAMPLE_KEY.to_string(), timestamp);
    }

    /// Like [`Asset::record_position`] but leaves `sample_times` alone, so a
    /// later reported position is never judged against this one.
    pub fn push_trail(&mut self, position: Position, timestamp: i64, cap: usize) {
        let position = position.clamped();
        self.position = position;
        self.trail.push_front(TrailPoint {
            x: position.x,
            y: position.y,
            timestamp,
        });
        self.trail.truncate(cap);
        self.last_update = self.last_update.max(timestamp);
    }

    /// Numeric metrics in key order.
    pub fn numeric_metrics(&self) -> impl Iterator<Item = (&str, f64)> {
        self.telemetry
            .iter()
            .filter_map(|(key, value)| value.as_f64().map(|v| (key.as_str(), v)))
    }
}
