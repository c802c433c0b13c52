use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::transport::{ChannelConnector, ChannelEvent, ChannelHandle};
use crate::error::TelemetryError;

/// Opens the push channel as a WebSocket at `{url}?token=...`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn channel_url(&self, token: &str) -> Result<Url, TelemetryError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| TelemetryError::Channel(format!("invalid channel url {}: {e}", self.url)))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

impl ChannelConnector for WsConnector {
    async fn connect(&self, token: &str) -> Result<ChannelHandle, TelemetryError> {
        let url = self.channel_url(token)?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TelemetryError::Channel(format!("websocket connect failed: {e}")))?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("websocket send failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(ChannelEvent::Message(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if inbound_tx.send(ChannelEvent::Message(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => debug!("dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = inbound_tx.send(ChannelEvent::Closed { reason });
        });

        Ok(ChannelHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
