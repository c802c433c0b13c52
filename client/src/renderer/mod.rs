mod surface;

pub use surface::{CommandRecorder, DrawCommand, Surface};

use pitwatch_shared::{Asset, Position};
use serde::Serialize;

use crate::colors::{BACKGROUND, GRID_LINE, OVERLAY_TEXT, StatusPalette};
use crate::viewport::{ScreenPoint, Viewport};

/// Marker radius in map units; scales with zoom.
const MARKER_RADIUS_UNITS: f64 = 1.2;
const MARKER_RADIUS_MIN_PX: f64 = 5.0;
const SELECTION_RING_GAP_PX: f64 = 4.0;
const TRAIL_WIDTH_PX: f64 = 2.0;
const GRID_STEP_UNITS: f64 = 10.0;
const GLYPH_FONT_PX: f64 = 11.0;
const OVERLAY_FONT_PX: f64 = 10.0;
const OVERLAY_LINE_PX: f64 = 12.0;
const OVERLAY_METRICS: usize = 2;
/// Markers this far outside the surface are still drawn so trails do not pop.
const CULL_MARGIN_PX: f64 = 32.0;

/// UI toggles the host controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapToggles {
    /// Gates the redraw cadence only; state updates keep running.
    pub playing: bool,
    pub show_trails: bool,
    pub show_telemetry: bool,
}

impl Default for MapToggles {
    fn default() -> Self {
        Self {
            playing: true,
            show_trails: true,
            show_telemetry: true,
        }
    }
}

/// Per-frame counts, logged periodically by the runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameMetrics {
    pub markers: u32,
    pub culled: u32,
    pub trail_segments: u32,
    pub overlays: u32,
    pub draw_commands: u32,
}

/// Stateless map painter: the same inputs always produce the same commands.
#[derive(Debug, Clone, Default)]
pub struct CanvasRenderer {
    palette: StatusPalette,
}

impl CanvasRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint one frame: background, trails, markers, then telemetry overlays.
    pub fn draw(
        &self,
        assets: &[Asset],
        viewport: &Viewport,
        toggles: MapToggles,
        selected: Option<&str>,
        surface: &mut dyn Surface,
    ) -> FrameMetrics {
        let mut metrics = FrameMetrics::default();
        let (w, h) = surface.size();
        surface.begin_frame();

        self.draw_background(viewport, w, h, surface, &mut metrics);

        let visible: Vec<(&Asset, ScreenPoint)> = assets
            .iter()
            .filter_map(|asset| {
                let at = viewport.world_to_screen(asset.position);
                if is_visible(at, w, h) {
                    Some((asset, at))
                } else {
                    metrics.culled += 1;
                    None
                }
            })
            .collect();

        if toggles.show_trails {
            for (asset, _) in &visible {
                self.draw_trail(asset, viewport, surface, &mut metrics);
            }
        }

        let radius = viewport
            .scaled_radius(MARKER_RADIUS_UNITS)
            .max(MARKER_RADIUS_MIN_PX);
        for (asset, at) in &visible {
            let colors = self.palette.get(asset.status);
            surface.fill_circle(*at, radius, &colors.fill);
            let glyph = asset.category.glyph().to_string();
            surface.fill_text(
                &glyph,
                ScreenPoint::new(at.x - GLYPH_FONT_PX * 0.3, at.y + GLYPH_FONT_PX * 0.35),
                BACKGROUND,
                GLYPH_FONT_PX,
            );
            metrics.draw_commands += 2;
            if selected == Some(asset.id.as_str()) {
                surface.stroke_circle(*at, radius + SELECTION_RING_GAP_PX, &colors.ring, 2.0);
                metrics.draw_commands += 1;
            }
            metrics.markers += 1;
        }

        if toggles.show_telemetry {
            for (asset, at) in &visible {
                let mut y = at.y + radius + OVERLAY_LINE_PX;
                for line in overlay_lines(asset) {
                    surface.fill_text(
                        &line,
                        ScreenPoint::new(at.x + radius + 2.0, y),
                        OVERLAY_TEXT,
                        OVERLAY_FONT_PX,
                    );
                    y += OVERLAY_LINE_PX;
                    metrics.draw_commands += 1;
                }
                metrics.overlays += 1;
            }
        }

        metrics
    }

    fn draw_background(
        &self,
        viewport: &Viewport,
        w: f64,
        h: f64,
        surface: &mut dyn Surface,
        metrics: &mut FrameMetrics,
    ) {
        surface.fill_rect(0.0, 0.0, w, h, BACKGROUND);
        metrics.draw_commands += 1;

        let mut unit = 0.0;
        while unit <= 100.0 {
            let vertical = [
                viewport.world_to_screen(Position::new(unit, 0.0)),
                viewport.world_to_screen(Position::new(unit, 100.0)),
            ];
            let horizontal = [
                viewport.world_to_screen(Position::new(0.0, unit)),
                viewport.world_to_screen(Position::new(100.0, unit)),
            ];
            surface.polyline(&vertical, GRID_LINE, 1.0);
            surface.polyline(&horizontal, GRID_LINE, 1.0);
            metrics.draw_commands += 2;
            unit += GRID_STEP_UNITS;
        }
    }

    fn draw_trail(
        &self,
        asset: &Asset,
        viewport: &Viewport,
        surface: &mut dyn Surface,
        metrics: &mut FrameMetrics,
    ) {
        if asset.trail.len() < 2 {
            return;
        }
        let points: Vec<ScreenPoint> = asset
            .trail
            .iter()
            .map(|p| viewport.world_to_screen(Position::new(p.x, p.y)))
            .collect();
        surface.polyline(&points, &self.palette.get(asset.status).trail, TRAIL_WIDTH_PX);
        metrics.trail_segments += (points.len() - 1) as u32;
        metrics.draw_commands += 1;
    }
}

fn is_visible(at: ScreenPoint, w: f64, h: f64) -> bool {
    at.x >= -CULL_MARGIN_PX
        && at.y >= -CULL_MARGIN_PX
        && at.x <= w + CULL_MARGIN_PX
        && at.y <= h + CULL_MARGIN_PX
}

/// First two metrics of an asset: its category's keys in order, then any others.
pub fn overlay_lines(asset: &Asset) -> Vec<String> {
    let preferred = asset.category.metric_keys();
    let ordered = preferred
        .iter()
        .filter_map(|key| asset.telemetry.get_key_value(*key))
        .chain(
            asset
                .telemetry
                .iter()
                .filter(|(key, _)| !preferred.contains(&key.as_str())),
        );
    ordered
        .take(OVERLAY_METRICS)
        .map(|(key, value)| format!("{key}: {value}"))
        .collect()
}
