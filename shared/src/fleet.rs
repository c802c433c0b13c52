use rand::Rng;

use crate::asset::{Asset, AssetCategory, AssetStatus, MAP_MAX, MAP_MIN, Position};
use crate::protocol::Device;

/// Deterministic map anchor for an asset id via CRC32 hash.
/// Keeps a 5-unit margin so markers never sit on the map edge.
pub fn anchor_position(id: &str) -> Position {
    let hash = crc32fast::hash(id.as_bytes());
    let bytes = hash.to_be_bytes();
    let span = (MAP_MAX - MAP_MIN) - 10.0;
    let x = MAP_MIN + 5.0 + f64::from(u16::from_be_bytes([bytes[0], bytes[1]])) / 65535.0 * span;
    let y = MAP_MIN + 5.0 + f64::from(u16::from_be_bytes([bytes[2], bytes[3]])) / 65535.0 * span;
    Position::new(x, y)
}

/// Bounded random walk: each axis moves by at most `step`, result stays in map space.
pub fn random_walk<R: Rng>(position: Position, step: f64, rng: &mut R) -> Position {
    if step <= 0.0 {
        return position.clamped();
    }
    Position::new(
        position.x + rng.gen_range(-step..=step),
        position.y + rng.gen_range(-step..=step),
    )
    .clamped()
}

/// Perturb a metric by at most `amount` in either direction.
pub fn jitter<R: Rng>(value: f64, amount: f64, rng: &mut R) -> f64 {
    if amount <= 0.0 {
        return value;
    }
    value + rng.gen_range(-amount..=amount)
}

/// Initial value for a metric key, before any telemetry arrives.
pub fn baseline_metric(key: &str) -> f64 {
    match key {
        "speed" => 24.0,
        "fuel" | "battery" => 78.0,
        "load" => 55.0,
        "utilization" => 64.0,
        "engineTemp" => 88.0,
        "temperature" => 61.0,
        "hydraulicPressure" => 310.0,
        "depth" => 12.0,
        "rpm" => 1150.0,
        "throughput" => 2400.0,
        "beltSpeed" => 4.2,
        _ => 0.0,
    }
}

type DemoSeed = (&'static str, &'static str, AssetCategory, f64, f64, AssetStatus);

const DEMO_SEEDS: &[DemoSeed] = &[
    ("HT-101", "Haul Truck 101", AssetCategory::Hauler, 22.0, 35.0, AssetStatus::Operational),
    ("HT-102", "Haul Truck 102", AssetCategory::Hauler, 48.0, 62.0, AssetStatus::Operational),
    ("HT-103", "Haul Truck 103", AssetCategory::Hauler, 71.0, 28.0, AssetStatus::Maintenance),
    ("EX-201", "Excavator 201", AssetCategory::Excavator, 35.0, 48.0, AssetStatus::Operational),
    ("EX-202", "Excavator 202", AssetCategory::Excavator, 62.0, 71.0, AssetStatus::Critical),
    ("DR-301", "Drill Rig 301", AssetCategory::Drill, 15.0, 78.0, AssetStatus::Operational),
    ("DZ-401", "Dozer 401", AssetCategory::Dozer, 83.0, 55.0, AssetStatus::Operational),
    ("CV-501", "Main Conveyor", AssetCategory::Conveyor, 55.0, 15.0, AssetStatus::Operational),
    ("PU-601", "Primary Crusher", AssetCategory::ProcessingUnit, 88.0, 12.0, AssetStatus::Operational),
    ("LV-701", "Survey Ute 701", AssetCategory::LightVehicle, 40.0, 88.0, AssetStatus::Offline),
];

/// Fixed demo site used when no authenticated backend is available.
pub fn demo_fleet() -> Vec<Asset> {
    DEMO_SEEDS
        .iter()
        .map(|&(id, name, category, x, y, status)| {
            let mut asset =
                Asset::new(id, name, category, Position::new(x, y)).with_status(status);
            for key in category.metric_keys() {
                asset = asset.with_metric(key, baseline_metric(key));
            }
            asset
        })
        .collect()
}

/// Backend device records for the demo site.
pub fn demo_devices() -> Vec<Device> {
    DEMO_SEEDS
        .iter()
        .map(|&(id, name, category, _, _, status)| Device {
            id: id.to_string(),
            name: name.to_string(),
            device_type: category.as_str().to_string(),
            label: Some(status.as_str().to_string()),
        })
        .collect()
}

/// Build an asset for a backend device, anchored deterministically on the map.
pub fn asset_from_device(device: &Device) -> Asset {
    let category = AssetCategory::from_device_type(&device.device_type);
    let mut asset = Asset::new(
        device.id.clone(),
        device.name.clone(),
        category,
        anchor_position(&device.id),
    );
    if let Some(status) = device.label.as_deref().and_then(AssetStatus::parse) {
        asset.status = status;
    }
    asset
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn anchor_is_deterministic_and_inside_margin() {
        let a = anchor_position("HT-101");
        assert_eq!(a, anchor_position("HT-101"));
        for id in ["a", "b", "EX-202", "a-much-longer-device-identifier"] {
            let p = anchor_position(id);
            assert!((5.0..=95.0).contains(&p.x), "x out of range for {id}: {}", p.x);
            assert!((5.0..=95.0).contains(&p.y), "y out of range for {id}: {}", p.y);
        }
    }

    #[test]
    fn random_walk_is_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = Position::new(99.5, 0.5);
        for _ in 0..500 {
            let next = random_walk(p, 1.5, &mut rng);
            assert!((next.x - p.x).abs() <= 1.5 + f64::EPSILON);
            assert!((next.y - p.y).abs() <= 1.5 + f64::EPSILON);
            assert!((MAP_MIN..=MAP_MAX).contains(&next.x));
            assert!((MAP_MIN..=MAP_MAX).contains(&next.y));
            p = next;
        }
    }

    #[test]
    fn demo_fleet_has_unique_ids_and_metrics() {
        let fleet = demo_fleet();
        let mut ids: Vec<_> = fleet.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), fleet.len());
        assert!(fleet.iter().all(|a| !a.telemetry.is_empty()));
        assert_eq!(demo_devices().len(), fleet.len());
    }

    #[test]
    fn asset_from_device_reads_status_label() {
        let device = Device {
            id: "EX-9".to_string(),
            name: "Excavator 9".to_string(),
            device_type: "shovel".to_string(),
            label: Some("maintenance".to_string()),
        };
        let asset = asset_from_device(&device);
        assert_eq!(asset.category, AssetCategory::Excavator);
        assert_eq!(asset.status, AssetStatus::Maintenance);
        assert_eq!(asset.display_name, "Excavator 9");
        assert_eq!(asset.position, anchor_position("EX-9"));
    }
}
