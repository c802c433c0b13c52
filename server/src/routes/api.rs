use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use pitwatch_shared::{AttributeScope, Attributes, Device, DeviceQuery, TimeseriesData};
use serde::Deserialize;
use tracing::debug;

use crate::config::{DEFAULT_HISTORY_LIMIT, MAX_DEVICE_PAGE_SIZE};
use crate::routes::auth::Authenticated;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeysQuery {
    #[serde(default)]
    keys: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    keys: Option<String>,
    #[serde(default)]
    start_ts: Option<i64>,
    #[serde(default)]
    end_ts: Option<i64>,
    #[serde(default)]
    limit: Option<usize>,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "devices": state.devices.len(),
        "sessions": state.sessions.len(),
        "channels": state.event_tx.receiver_count(),
    }))
}

pub async fn list_devices(
    Authenticated(session): Authenticated,
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<Device>>, StatusCode> {
    if query.page_size == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let page_size = query.page_size.min(MAX_DEVICE_PAGE_SIZE);
    let device_type = query
        .device_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let devices = state.devices_page(page_size, query.page, device_type);
    debug!(
        username = %session.username,
        page = query.page,
        page_size,
        returned = devices.len(),
        "devices listed"
    );
    Ok(Json(devices))
}

pub async fn latest_telemetry(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<TimeseriesData>, StatusCode> {
    let keys = parse_keys(query.keys.as_deref());
    state
        .latest(&device_id, &keys)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn telemetry_history(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TimeseriesData>, StatusCode> {
    let start_ts = query.start_ts.unwrap_or(0);
    let end_ts = query.end_ts.unwrap_or(i64::MAX);
    if start_ts > end_ts {
        return Err(StatusCode::BAD_REQUEST);
    }
    let limit = query
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    let keys = parse_keys(query.keys.as_deref());
    state
        .history(&device_id, &keys, start_ts, end_ts, limit)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_attributes(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path((device_id, scope)): Path<(String, String)>,
) -> Result<Json<Attributes>, StatusCode> {
    let scope = AttributeScope::parse(&scope).ok_or(StatusCode::BAD_REQUEST)?;
    state
        .attributes(&device_id, scope)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn save_attributes(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path((device_id, scope)): Path<(String, String)>,
    Json(attributes): Json<Attributes>,
) -> StatusCode {
    let Some(scope) = AttributeScope::parse(&scope) else {
        return StatusCode::BAD_REQUEST;
    };
    let count = attributes.len();
    if state.save_attributes(&device_id, scope, attributes) {
        debug!(device_id = %device_id, %scope, count, "attributes saved");
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Comma-separated key list. Absent or blank means every key.
fn parse_keys(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use pitwatch_shared::{LoginResponse, TelemetryValue};

    use super::parse_keys;
    use crate::config::{DEFAULT_PASSWORD, DEFAULT_USERNAME};
    use crate::state::{AppState, StateSettings};

    pub(crate) fn seeded_state() -> AppState {
        let state = AppState::with_settings(StateSettings::default());
        state.seed_demo_fleet(1_000);
        state
    }

    pub(crate) async fn spawn_test_server(
        state: AppState,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    pub(crate) async fn login(client: &reqwest::Client, base_url: &str) -> String {
        client
            .post(format!("{base_url}/api/auth/login"))
            .json(&serde_json::json!({
                "username": DEFAULT_USERNAME,
                "password": DEFAULT_PASSWORD,
            }))
            .send()
            .await
            .expect("login request")
            .error_for_status()
            .expect("login status")
            .json::<LoginResponse>()
            .await
            .expect("parse login")
            .token
    }

    #[test]
    fn parse_keys_trims_and_drops_blanks() {
        assert_eq!(parse_keys(Some(" speed, ,fuel,")), vec!["speed", "fuel"]);
        assert!(parse_keys(Some("  ")).is_empty());
        assert!(parse_keys(None).is_empty());
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/api/auth/login"))
            .json(&serde_json::json!({"username": DEFAULT_USERNAME, "password": "nope"}))
            .send()
            .await
            .expect("login request");
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        server_handle.abort();
    }

    #[tokio::test]
    async fn device_routes_require_a_session() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let client = reqwest::Client::new();

        let anonymous = client
            .get(format!("http://{addr}/api/devices?pageSize=10&page=0"))
            .send()
            .await
            .expect("devices request");
        assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

        let forged = client
            .get(format!("http://{addr}/api/devices?pageSize=10&page=0"))
            .bearer_auth("forged")
            .send()
            .await
            .expect("devices request");
        assert_eq!(forged.status(), reqwest::StatusCode::UNAUTHORIZED);
        server_handle.abort();
    }

    #[tokio::test]
    async fn devices_are_paginated_and_filtered() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();
        let token = login(&client, &base_url).await;

        let page = client
            .get(format!("{base_url}/api/devices"))
            .query(&[("pageSize", "2"), ("page", "1")])
            .bearer_auth(&token)
            .send()
            .await
            .expect("devices request")
            .error_for_status()
            .expect("devices status")
            .json::<Vec<serde_json::Value>>()
            .await
            .expect("parse devices");
        assert_eq!(page.len(), 2);
        assert!(page[0].get("type").is_some());

        let drills = client
            .get(format!("{base_url}/api/devices"))
            .query(&[("pageSize", "50"), ("page", "0"), ("type", "drill")])
            .bearer_auth(&token)
            .send()
            .await
            .expect("devices request")
            .json::<Vec<serde_json::Value>>()
            .await
            .expect("parse devices");
        assert_eq!(drills.len(), 1);
        assert_eq!(drills[0]["id"], "DR-301");

        let zero = client
            .get(format!("{base_url}/api/devices?pageSize=0&page=0"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("devices request");
        assert_eq!(zero.status(), reqwest::StatusCode::BAD_REQUEST);
        server_handle.abort();
    }

    #[tokio::test]
    async fn telemetry_latest_and_history_contract() {
        let state = seeded_state();
        let mut data = pitwatch_shared::TimeseriesData::new();
        data.insert(
            "speed".to_string(),
            vec![(2_000, TelemetryValue::Number(30.0)), (3_000, TelemetryValue::Number(31.5))],
        );
        state.record("HT-101", data);
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();
        let token = login(&client, &base_url).await;

        let latest = client
            .get(format!("{base_url}/api/devices/HT-101/telemetry/latest?keys=speed,fuel"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("latest request")
            .error_for_status()
            .expect("latest status")
            .json::<serde_json::Value>()
            .await
            .expect("parse latest");
        assert_eq!(latest, serde_json::json!({"fuel": [[1000, 78.0]], "speed": [[3000, 31.5]]}));

        let history = client
            .get(format!(
                "{base_url}/api/devices/HT-101/telemetry/history?keys=speed&startTs=1500&endTs=5000&limit=10"
            ))
            .bearer_auth(&token)
            .send()
            .await
            .expect("history request")
            .json::<serde_json::Value>()
            .await
            .expect("parse history");
        assert_eq!(history, serde_json::json!({"speed": [[2000, 30.0], [3000, 31.5]]}));

        let missing = client
            .get(format!("{base_url}/api/devices/NOPE/telemetry/latest"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("latest request");
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let inverted = client
            .get(format!("{base_url}/api/devices/HT-101/telemetry/history?startTs=9&endTs=1"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("history request");
        assert_eq!(inverted.status(), reqwest::StatusCode::BAD_REQUEST);
        server_handle.abort();
    }

    #[tokio::test]
    async fn attributes_round_trip_per_scope() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();
        let token = login(&client, &base_url).await;

        let server_scope = client
            .get(format!("{base_url}/api/devices/EX-202/attributes/SERVER_SCOPE"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("attributes request")
            .json::<serde_json::Value>()
            .await
            .expect("parse attributes");
        assert_eq!(server_scope["status"], "critical");

        client
            .post(format!("{base_url}/api/devices/EX-202/attributes/SHARED_SCOPE"))
            .bearer_auth(&token)
            .json(&serde_json::json!({"targetRpm": 1200}))
            .send()
            .await
            .expect("save request")
            .error_for_status()
            .expect("save status");
        let shared = client
            .get(format!("{base_url}/api/devices/EX-202/attributes/SHARED_SCOPE"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("attributes request")
            .json::<serde_json::Value>()
            .await
            .expect("parse attributes");
        assert_eq!(shared, serde_json::json!({"targetRpm": 1200.0}));

        let bad_scope = client
            .get(format!("{base_url}/api/devices/EX-202/attributes/EVERYTHING"))
            .bearer_auth(&token)
            .send()
            .await
            .expect("attributes request");
        assert_eq!(bad_scope.status(), reqwest::StatusCode::BAD_REQUEST);
        server_handle.abort();
    }

    #[tokio::test]
    async fn health_reports_devices_and_sessions() {
        let (addr, server_handle) = spawn_test_server(seeded_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();
        login(&client, &base_url).await;

        let health = client
            .get(format!("{base_url}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");
        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(health["devices"], pitwatch_shared::demo_devices().len());
        assert_eq!(health["sessions"], 1);
        server_handle.abort();
    }
}
