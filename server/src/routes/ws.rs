use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use pitwatch_shared::{ChannelCommand, PushMessage, TimeseriesData, TsSubCmd};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::state::{AppState, Session, TelemetrySample};

#[derive(Debug, Deserialize)]
pub struct ChannelAuth {
    #[serde(default)]
    token: Option<String>,
}

/// Active subscriptions of one connection, by `cmdId`.
type Subscriptions = HashMap<String, TsSubCmd>;

pub async fn telemetry_channel(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(auth): Query<ChannelAuth>,
) -> Response {
    let Some(session) = auth.token.as_deref().and_then(|token| state.session(token)) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
}

async fn handle_socket(socket: WebSocket, state: AppState, session: Session) {
    let (mut sender, mut receiver) = socket.split();
    let mut samples = BroadcastStream::new(state.event_tx.subscribe());
    let mut subscriptions = Subscriptions::new();
    let username = session.username;
    info!(%username, logged_in_at = %session.issued_at, "push channel opened");

    'channel: loop {
        tokio::select! {
            incoming = receiver.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(error = %e, "push channel read failed");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => {
                        for frame in apply_command(&state, &mut subscriptions, text.as_str()) {
                            if sender.send(Message::Text(frame.into())).await.is_err() {
                                break 'channel;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            sample = samples.next() => {
                match sample {
                    Some(Ok(sample)) => {
                        for frame in frames_for(&subscriptions, &sample) {
                            if sender.send(Message::Text(frame.into())).await.is_err() {
                                break 'channel;
                            }
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, %username, "push channel lagged behind broadcast buffer");
                    }
                    None => break,
                }
            }
        }
    }

    info!(%username, subscriptions = subscriptions.len(), "push channel closed");
}

/// Apply one client frame. Returns the initial frames owed to new
/// subscriptions (current latest values).
fn apply_command(state: &AppState, subscriptions: &mut Subscriptions, text: &str) -> Vec<String> {
    let command: ChannelCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "ignoring malformed channel command");
            return Vec::new();
        }
    };

    if let Some(unsubscribe) = command.unsubscribe {
        if subscriptions.remove(&unsubscribe.cmd_id).is_some() {
            debug!(cmd_id = %unsubscribe.cmd_id, "unsubscribed");
        }
    }

    let mut frames = Vec::new();
    for cmd in command.ts_sub_cmds {
        if !state.has_device(&cmd.entity_id) {
            warn!(device_id = %cmd.entity_id, cmd_id = %cmd.cmd_id, "subscription for unknown device");
        }
        debug!(device_id = %cmd.entity_id, cmd_id = %cmd.cmd_id, keys = cmd.keys.len(), "subscribed");
        if let Some(latest) = state.latest(&cmd.entity_id, &cmd.keys)
            && let Some(frame) = encode(&cmd.cmd_id, latest)
        {
            frames.push(frame);
        }
        subscriptions.insert(cmd.cmd_id.clone(), cmd);
    }
    frames
}

/// Frames for every subscription interested in `sample`, each narrowed to
/// its own keys.
fn frames_for(subscriptions: &Subscriptions, sample: &TelemetrySample) -> Vec<String> {
    subscriptions
        .values()
        .filter(|cmd| cmd.entity_id == sample.device_id)
        .filter_map(|cmd| {
            let data: TimeseriesData = sample
                .data
                .iter()
                .filter(|(key, _)| cmd.keys.is_empty() || cmd.keys.contains(*key))
                .map(|(key, samples)| (key.clone(), samples.clone()))
                .collect();
            encode(&cmd.cmd_id, data)
        })
        .collect()
}

fn encode(cmd_id: &str, data: TimeseriesData) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let message = PushMessage {
        cmd_id: cmd_id.to_string(),
        data,
    };
    match serde_json::to_string(&message) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, cmd_id, "failed to encode push frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pitwatch_shared::TelemetryValue;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use super::*;
    use crate::routes::api::tests::{login, seeded_state, spawn_test_server};

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    fn series(key: &str, ts: i64, value: f64) -> TimeseriesData {
        [(key.to_string(), vec![(ts, TelemetryValue::Number(value))])]
            .into_iter()
            .collect()
    }

    async fn next_push(client: &mut Client) -> PushMessage {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("push frame within timeout")
                .expect("channel open")
                .expect("valid frame");
            if let WsMessage::Text(text) = message {
                return serde_json::from_str(&text).expect("push frame parses");
            }
        }
    }

    async fn send(client: &mut Client, command: &ChannelCommand) {
        let text = serde_json::to_string(command).expect("encode command");
        client.send(WsMessage::Text(text)).await.expect("send command");
    }

    #[test]
    fn frames_are_narrowed_to_subscribed_keys() {
        let mut subscriptions = Subscriptions::new();
        subscriptions.insert(
            "T_1".to_string(),
            TsSubCmd::latest("T", "T_1", ["speed".to_string()]),
        );
        subscriptions.insert(
            "U_1".to_string(),
            TsSubCmd::latest("U", "U_1", ["speed".to_string()]),
        );
        let mut data = series("speed", 10, 1.0);
        data.extend(series("fuel", 10, 2.0));
        let sample = TelemetrySample {
            device_id: "T".to_string(),
            data: Arc::new(data),
        };

        let frames = frames_for(&subscriptions, &sample);
        assert_eq!(frames, vec![r#"{"cmdId":"T_1","data":{"speed":[[10,1.0]]}}"#.to_string()]);
    }

    #[test]
    fn malformed_commands_leave_subscriptions_untouched() {
        let state = seeded_state();
        let mut subscriptions = Subscriptions::new();
        assert!(apply_command(&state, &mut subscriptions, "{not json").is_empty());
        assert!(subscriptions.is_empty());
    }

    #[tokio::test]
    async fn channel_rejects_unknown_tokens() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let result = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws?token=forged")).await;
        assert!(result.is_err());
        server_handle.abort();
    }

    #[tokio::test]
    async fn channel_multiplexes_subscriptions_by_cmd_id() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let base_url = format!("http://{addr}");
        let token = login(&reqwest::Client::new(), &base_url).await;
        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws?token={token}"))
            .await
            .expect("open push channel");

        send(
            &mut client,
            &ChannelCommand::subscribe(TsSubCmd::latest("HT-101", "HT-101_1", ["speed".to_string()])),
        )
        .await;
        let initial = next_push(&mut client).await;
        assert_eq!(initial.cmd_id, "HT-101_1");
        assert_eq!(initial.data.keys().collect::<Vec<_>>(), vec!["speed"]);

        state.record("EX-201", series("fuel", 4_000, 12.0));
        let mut update = series("speed", 5_000, 40.0);
        update.extend(series("fuel", 5_000, 70.0));
        state.record("HT-101", update);
        let pushed = next_push(&mut client).await;
        assert_eq!(pushed.cmd_id, "HT-101_1");
        assert_eq!(pushed.data, series("speed", 5_000, 40.0));

        send(&mut client, &ChannelCommand::unsubscribe("HT-101_1")).await;
        send(
            &mut client,
            &ChannelCommand::subscribe(TsSubCmd::latest("HT-101", "HT-101_2", ["fuel".to_string()])),
        )
        .await;
        let second = next_push(&mut client).await;
        assert_eq!(second.cmd_id, "HT-101_2");
        assert_eq!(second.data, series("fuel", 5_000, 70.0));

        let mut later = series("speed", 6_000, 41.0);
        later.extend(series("fuel", 6_000, 69.0));
        state.record("HT-101", later);
        let only = next_push(&mut client).await;
        assert_eq!(only.cmd_id, "HT-101_2");
        assert_eq!(only.data, series("fuel", 6_000, 69.0));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), client.next())
                .await
                .is_err(),
            "unsubscribed command must not receive frames"
        );

        server_handle.abort();
    }
}
