use pitwatch_shared::{MAP_MAX, MAP_MIN, Position};

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;

/// A point in screen (surface pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Viewport manages the pan/zoom transformation from normalized map space to screen space.
///
/// Map space `[0, 100]` spans the full surface at `scale = 1`. Scale is applied
/// about the surface center, then `pan` (screen pixels) is added.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// Resize the surface. Pan and scale are kept.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    fn pixels_per_unit(&self) -> (f64, f64) {
        let span = MAP_MAX - MAP_MIN;
        (self.width / span, self.height / span)
    }

    /// Convert map coordinates to screen coordinates.
    pub fn world_to_screen(&self, p: Position) -> ScreenPoint {
        let (ux, uy) = self.pixels_per_unit();
        let (cx, cy) = (self.width / 2.0, self.height / 2.0);
        ScreenPoint {
            x: cx + ((p.x - MAP_MIN) * ux - cx) * self.scale + self.pan_x,
            y: cy + ((p.y - MAP_MIN) * uy - cy) * self.scale + self.pan_y,
        }
    }

    /// Convert screen coordinates to map coordinates. Not clamped to map space.
    pub fn screen_to_world(&self, s: ScreenPoint) -> Position {
        let (ux, uy) = self.pixels_per_unit();
        let (cx, cy) = (self.width / 2.0, self.height / 2.0);
        Position {
            x: MAP_MIN + ((s.x - self.pan_x - cx) / self.scale + cx) / ux,
            y: MAP_MIN + ((s.y - self.pan_y - cy) / self.scale + cy) / uy,
        }
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Multiply scale by `factor`, clamped to `[MIN_SCALE, MAX_SCALE]`.
    /// Non-finite or non-positive factors are ignored.
    pub fn zoom_by(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    /// Screen-space radius of a map-space distance.
    pub fn scaled_radius(&self, map_units: f64) -> f64 {
        let (ux, uy) = self.pixels_per_unit();
        map_units * ux.min(uy) * self.scale
    }
}
