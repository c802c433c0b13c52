use std::time::Duration;

use chrono::Utc;
use pitwatch_shared::fleet::{anchor_position, baseline_metric, jitter, random_walk};
use pitwatch_shared::{
    AssetCategory, AssetStatus, AttributeScope, Attributes, Position, TelemetryValue,
    TimeseriesData,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{SIM_METRIC_JITTER, SIM_POSITION_STEP};
use crate::state::{AppState, POSITION_X_KEY, POSITION_Y_KEY, STATUS_KEY};

pub async fn run(state: AppState, tick: Duration) {
    info!("Fleet simulator started (tick: {}ms)", tick.as_millis());
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Consume immediate tick so the seeded samples stand for one period.
    interval.tick().await;
    let mut rng = StdRng::from_entropy();

    loop {
        interval.tick().await;
        let updated = step(&state, &mut rng, Utc::now().timestamp_millis());
        debug!(updated, subscribers = state.event_tx.receiver_count(), "fleet tick");
    }
}

/// Advance every operational device by one sample. Mobile categories also
/// random-walk their server-scope position. Returns the number of devices
/// that reported.
pub fn step<R: Rng>(state: &AppState, rng: &mut R, now_ms: i64) -> usize {
    let mut devices: Vec<(String, String)> = state
        .devices
        .iter()
        .map(|entry| (entry.id.clone(), entry.device_type.clone()))
        .collect();
    devices.sort();

    let mut updated = 0;
    for (device_id, device_type) in devices {
        let attributes = state
            .attributes(&device_id, AttributeScope::Server)
            .unwrap_or_default();
        let status = attributes
            .get(STATUS_KEY)
            .and_then(|value| value.as_str())
            .and_then(AssetStatus::parse)
            .unwrap_or_default();
        if status != AssetStatus::Operational {
            continue;
        }

        let category = AssetCategory::from_device_type(&device_type);
        let mut data = TimeseriesData::new();
        if category.is_mobile() {
            let current = position_of(&attributes).unwrap_or_else(|| anchor_position(&device_id));
            let next = random_walk(current, SIM_POSITION_STEP, rng);
            let moved: Attributes = [
                (POSITION_X_KEY.to_string(), TelemetryValue::Number(next.x)),
                (POSITION_Y_KEY.to_string(), TelemetryValue::Number(next.y)),
            ]
            .into_iter()
            .collect();
            state.save_attributes(&device_id, AttributeScope::Server, moved);
            data.insert(
                POSITION_X_KEY.to_string(),
                vec![(now_ms, TelemetryValue::Number(next.x))],
            );
            data.insert(
                POSITION_Y_KEY.to_string(),
                vec![(now_ms, TelemetryValue::Number(next.y))],
            );
        }

        let keys: Vec<String> = category
            .metric_keys()
            .iter()
            .map(|key| key.to_string())
            .collect();
        let latest = state.latest(&device_id, &keys).unwrap_or_default();
        for key in &keys {
            let current = latest
                .get(key)
                .and_then(|samples| samples.last())
                .and_then(|(_, value)| value.as_f64())
                .unwrap_or_else(|| baseline_metric(key));
            let amount = (current.abs() * SIM_METRIC_JITTER).max(0.1);
            let next = jitter(current, amount, rng).max(0.0);
            data.insert(key.clone(), vec![(now_ms, TelemetryValue::Number(next))]);
        }

        state.record(&device_id, data);
        updated += 1;
    }
    updated
}

fn position_of(attributes: &Attributes) -> Option<Position> {
    let x = attributes.get(POSITION_X_KEY)?.as_f64()?;
    let y = attributes.get(POSITION_Y_KEY)?.as_f64()?;
    Some(Position::new(x, y))
}
