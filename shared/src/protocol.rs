use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::TelemetryValue;

pub const ENTITY_TYPE_DEVICE: &str = "DEVICE";
pub const SCOPE_LATEST_TELEMETRY: &str = "LATEST_TELEMETRY";

/// `key -> [(origin timestamp ms, value)]`, newest last.
pub type TimeseriesData = BTreeMap<String, Vec<(i64, TelemetryValue)>>;

pub type Attributes = BTreeMap<String, TelemetryValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Query for `GET /devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub page_size: u32,
    pub page: u32,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeScope {
    #[serde(rename = "SERVER_SCOPE")]
    Server,
    #[serde(rename = "SHARED_SCOPE")]
    Shared,
    #[serde(rename = "CLIENT_SCOPE")]
    Client,
}

impl AttributeScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "SERVER_SCOPE",
            Self::Shared => "SHARED_SCOPE",
            Self::Client => "CLIENT_SCOPE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SERVER_SCOPE" => Some(Self::Server),
            "SHARED_SCOPE" => Some(Self::Shared),
            "CLIENT_SCOPE" => Some(Self::Client),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-series subscription command for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsSubCmd {
    pub entity_type: String,
    pub entity_id: String,
    pub scope: String,
    pub cmd_id: String,
    pub keys: Vec<String>,
}

impl TsSubCmd {
    pub fn latest(device_id: &str, cmd_id: &str, keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            entity_type: ENTITY_TYPE_DEVICE.to_string(),
            entity_id: device_id.to_string(),
            scope: SCOPE_LATEST_TELEMETRY.to_string(),
            cmd_id: cmd_id.to_string(),
            keys: keys.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeCmd {
    pub cmd_id: String,
}

/// A frame sent from client to server over the push channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCommand {
    #[serde(rename = "tsSubCmds", default, skip_serializing_if = "Vec::is_empty")]
    pub ts_sub_cmds: Vec<TsSubCmd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<UnsubscribeCmd>,
}

impl ChannelCommand {
    pub fn subscribe(cmd: TsSubCmd) -> Self {
        Self {
            ts_sub_cmds: vec![cmd],
            unsubscribe: None,
        }
    }

    pub fn unsubscribe(cmd_id: &str) -> Self {
        Self {
            ts_sub_cmds: Vec::new(),
            unsubscribe: Some(UnsubscribeCmd {
                cmd_id: cmd_id.to_string(),
            }),
        }
    }
}

/// A frame pushed from server to client, tagged with the originating `cmdId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub cmd_id: String,
    #[serde(default)]
    pub data: TimeseriesData,
}

impl PushMessage {
    /// Latest value per key, by origin timestamp.
    pub fn latest(&self) -> impl Iterator<Item = (&str, i64, &TelemetryValue)> {
        self.data.iter().filter_map(|(key, samples)| {
            samples
                .iter()
                .max_by_key(|(ts, _)| *ts)
                .map(|(ts, value)| (key.as_str(), *ts, value))
        })
    }
}
