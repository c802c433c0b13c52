use pitwatch_shared::{AssetStatus, colors::brighten, status_color};

pub const BACKGROUND: &str = "#0c0e17";
pub const GRID_LINE: &str = "rgba(255,255,255,0.06)";
pub const TRAIL_ALPHA: f64 = 0.45;
pub const OVERLAY_TEXT: &str = "#e6e9f2";

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

/// Precomputed CSS strings for one status so the per-frame path never formats colors.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedColors {
    pub fill: String,
    pub trail: String,
    pub ring: String,
}

impl CachedColors {
    fn for_status(status: AssetStatus) -> Self {
        let (r, g, b) = status_color(status);
        let (rr, rg, rb) = brighten((r, g, b), 1.4);
        Self {
            fill: rgba_css(r, g, b, 0.95),
            trail: rgba_css(r, g, b, TRAIL_ALPHA),
            ring: rgba_css(rr, rg, rb, 1.0),
        }
    }
}

/// Marker colors for every status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPalette {
    operational: CachedColors,
    maintenance: CachedColors,
    critical: CachedColors,
    offline: CachedColors,
}

impl Default for StatusPalette {
    fn default() -> Self {
        Self {
            operational: CachedColors::for_status(AssetStatus::Operational),
            maintenance: CachedColors::for_status(AssetStatus::Maintenance),
            critical: CachedColors::for_status(AssetStatus::Critical),
            offline: CachedColors::for_status(AssetStatus::Offline),
        }
    }
}

impl StatusPalette {
    pub fn get(&self, status: AssetStatus) -> &CachedColors {
        match status {
            AssetStatus::Operational => &self.operational,
            AssetStatus::Maintenance => &self.maintenance,
            AssetStatus::Critical => &self.critical,
            AssetStatus::Offline => &self.offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_css_formats_components() {
        assert_eq!(rgba_css(46, 204, 113, 0.5), "rgba(46,204,113,0.5)");
    }

    #[test]
    fn palette_matches_status_colors() {
        let palette = StatusPalette::default();
        assert_eq!(palette.get(AssetStatus::Critical).fill, "rgba(231,76,60,0.95)");
        assert_ne!(
            palette.get(AssetStatus::Operational).ring,
            palette.get(AssetStatus::Operational).fill
        );
    }
}
