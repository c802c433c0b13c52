#![allow(async_fn_in_trait)]

use tokio::sync::mpsc;

use pitwatch_shared::{Attributes, AttributeScope, Device, DeviceQuery, TimeseriesData};

use crate::config::Credentials;
use crate::error::TelemetryError;

/// Time window for a historical telemetry read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start_ts: i64,
    pub end_ts: i64,
    pub limit: u32,
}

/// REST side of the telemetry backend. Every call is made on the client's
/// thread; implementations need not be `Send`.
pub trait TelemetryApi {
    /// Exchange credentials for a session token.
    async fn login(&self, credentials: &Credentials) -> Result<String, TelemetryError>;

    async fn devices(&self, token: &str, query: &DeviceQuery) -> Result<Vec<Device>, TelemetryError>;

    async fn latest_telemetry(
        &self,
        token: &str,
        device_id: &str,
        keys: &[String],
    ) -> Result<TimeseriesData, TelemetryError>;

    async fn telemetry_history(
        &self,
        token: &str,
        device_id: &str,
        keys: &[String],
        window: HistoryWindow,
    ) -> Result<TimeseriesData, TelemetryError>;

    async fn attributes(
        &self,
        token: &str,
        device_id: &str,
        scope: AttributeScope,
    ) -> Result<Attributes, TelemetryError>;

    async fn save_attributes(
        &self,
        token: &str,
        device_id: &str,
        scope: AttributeScope,
        attributes: &Attributes,
    ) -> Result<(), TelemetryError>;
}

/// Something that arrived on an open push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(String),
    Closed { reason: Option<String> },
}

/// Both halves of an open push channel. Dropping `outbound` closes the channel.
#[derive(Debug)]
pub struct ChannelHandle {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Opens the single persistent push channel.
pub trait ChannelConnector {
    async fn connect(&self, token: &str) -> Result<ChannelHandle, TelemetryError>;
}
