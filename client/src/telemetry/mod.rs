//! Telemetry backend access: REST reads, the multiplexed push channel, and
//! the connection lifecycle around them.

mod client;
mod connection;
mod events;
mod http;
mod subscriptions;
mod transport;
mod ws;

pub use client::TelemetryClient;
pub use connection::{ConnectionMachine, ConnectionState, ReconnectBackoff};
pub use events::{
    AuthenticationEvent, ConnectionEvent, DeviceEvent, EventHub, ListenerId, Listeners,
    TelemetryEvent,
};
pub use http::HttpTelemetryApi;
pub use subscriptions::{Subscription, SubscriptionId, SubscriptionTable, TelemetryCallback};
pub use transport::{ChannelConnector, ChannelEvent, ChannelHandle, HistoryWindow, TelemetryApi};
pub use ws::WsConnector;

/// Client wired to the real HTTP and WebSocket transports.
pub type LiveTelemetryClient = TelemetryClient<HttpTelemetryApi, WsConnector>;

#[cfg(test)]
pub(crate) use client::fakes;
