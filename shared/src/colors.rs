use crate::asset::AssetStatus;

/// Base marker color per status as (r, g, b).
pub fn status_color(status: AssetStatus) -> (u8, u8, u8) {
    match status {
        AssetStatus::Operational => (46, 204, 113),
        AssetStatus::Maintenance => (241, 196, 15),
        AssetStatus::Critical => (231, 76, 60),
        AssetStatus::Offline => (127, 140, 141),
    }
}

/// Scale a color by `factor` (1.0 = unchanged, >1.0 = brighter), saturating at 255.
pub fn brighten(color: (u8, u8, u8), factor: f64) -> (u8, u8, u8) {
    let channel = |c: u8| (f64::from(c) * factor).clamp(0.0, 255.0) as u8;
    (channel(color.0), channel(color.1), channel(color.2))
}
