use pitwatch_shared::Asset;
use tracing::debug;

use crate::store::AssetStore;
use crate::viewport::{ScreenPoint, Viewport};

pub const HIT_RADIUS_PX: f64 = 15.0;
pub const ZOOM_IN_FACTOR: f64 = 1.1;
pub const ZOOM_OUT_FACTOR: f64 = 0.9;

/// What a pointer-down resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerDown {
    Selected(String),
    DragStarted,
}

/// Translates pointer and wheel input into selection, pan, and zoom.
/// Selections are returned from [`InteractionController::pointer_down`];
/// the owning view announces them.
///
/// Hit-testing picks the first asset in store order within [`HIT_RADIUS_PX`],
/// not the nearest one. Wheel zoom is anchored at the viewport center.
pub struct InteractionController {
    hit_radius: f64,
    dragging: bool,
    last_pointer: ScreenPoint,
    selected: Option<String>,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(HIT_RADIUS_PX)
    }
}

impl InteractionController {
    pub fn new(hit_radius: f64) -> Self {
        Self {
            hit_radius: hit_radius.max(0.0),
            dragging: false,
            last_pointer: ScreenPoint::default(),
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// First asset in store order whose marker lies within the hit radius.
    pub fn hit_test<'a>(&self, point: ScreenPoint, store: &'a AssetStore, viewport: &Viewport) -> Option<&'a Asset> {
        store
            .assets()
            .iter()
            .find(|asset| viewport.world_to_screen(asset.position).distance_to(point) <= self.hit_radius)
    }

    pub fn pointer_down(&mut self, point: ScreenPoint, store: &AssetStore, viewport: &Viewport) -> PointerDown {
        if let Some(asset) = self.hit_test(point, store, viewport) {
            debug!(asset_id = %asset.id, "asset selected");
            self.selected = Some(asset.id.clone());
            self.dragging = false;
            return PointerDown::Selected(asset.id.clone());
        }
        self.dragging = true;
        self.last_pointer = point;
        PointerDown::DragStarted
    }

    /// Pans by the delta from the last pointer position while dragging.
    /// Returns whether the viewport changed.
    pub fn pointer_move(&mut self, point: ScreenPoint, viewport: &mut Viewport) -> bool {
        if !self.dragging {
            return false;
        }
        let dx = point.x - self.last_pointer.x;
        let dy = point.y - self.last_pointer.y;
        self.last_pointer = point;
        viewport.pan(dx, dy);
        true
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    /// Positive `delta_y` (scrolling down) zooms out, negative zooms in.
    pub fn wheel(&mut self, delta_y: f64, viewport: &mut Viewport) {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let factor = if delta_y > 0.0 { ZOOM_OUT_FACTOR } else { ZOOM_IN_FACTOR };
        viewport.zoom_by(factor);
    }
}

#[cfg(test)]
mod tests {
    use pitwatch_shared::{AssetCategory, Position};

    use super::*;

    fn store_with(positions: &[(&str, f64, f64)]) -> AssetStore {
        AssetStore::with_assets(
            positions
                .iter()
                .map(|&(id, x, y)| Asset::new(id, id, AssetCategory::Hauler, Position::new(x, y))),
            20,
        )
    }

    #[test]
    fn pointer_down_on_asset_selects_it() {
        let store = store_with(&[("A1", 25.0, 50.0), ("A2", 75.0, 50.0)]);
        let viewport = Viewport::new(800.0, 600.0);
        let mut controller = InteractionController::default();

        let at = viewport.world_to_screen(Position::new(25.0, 50.0));
        let outcome = controller.pointer_down(at, &store, &viewport);

        assert_eq!(outcome, PointerDown::Selected("A1".into()));
        assert_eq!(controller.selected(), Some("A1"));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn overlapping_hits_resolve_by_store_order() {
        // A2 is exactly under the pointer, A1 is 10px away but earlier in the store.
        let store = store_with(&[("A1", 50.0, 50.0), ("A2", 51.25, 50.0)]);
        let viewport = Viewport::new(800.0, 600.0);
        let mut controller = InteractionController::default();

        let at = viewport.world_to_screen(Position::new(51.25, 50.0));
        assert_eq!(
            controller.pointer_down(at, &store, &viewport),
            PointerDown::Selected("A1".into())
        );
    }

    #[test]
    fn miss_starts_drag_and_moves_pan() {
        let store = store_with(&[("A1", 10.0, 10.0)]);
        let mut viewport = Viewport::new(800.0, 600.0);
        let mut controller = InteractionController::default();

        let outcome = controller.pointer_down(ScreenPoint::new(400.0, 300.0), &store, &viewport);
        assert_eq!(outcome, PointerDown::DragStarted);
        assert!(controller.pointer_move(ScreenPoint::new(410.0, 295.0), &mut viewport));
        assert!(controller.pointer_move(ScreenPoint::new(430.0, 300.0), &mut viewport));
        assert_eq!((viewport.pan_x, viewport.pan_y), (30.0, 0.0));

        controller.pointer_up();
        assert!(!controller.pointer_move(ScreenPoint::new(900.0, 900.0), &mut viewport));
        assert_eq!((viewport.pan_x, viewport.pan_y), (30.0, 0.0));
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn hit_test_follows_pan_and_zoom() {
        let store = store_with(&[("A1", 50.0, 50.0)]);
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.zoom_by(2.0);
        viewport.pan(100.0, 0.0);
        let controller = InteractionController::default();

        assert!(controller.hit_test(ScreenPoint::new(400.0, 300.0), &store, &viewport).is_none());
        assert_eq!(
            controller
                .hit_test(ScreenPoint::new(505.0, 305.0), &store, &viewport)
                .map(|a| a.id.as_str()),
            Some("A1")
        );
    }

    #[test]
    fn wheel_direction_picks_zoom_factor() {
        let mut viewport = Viewport::default();
        let mut controller = InteractionController::default();
        controller.wheel(-120.0, &mut viewport);
        assert!((viewport.scale - 1.1).abs() < 1e-12);
        controller.wheel(120.0, &mut viewport);
        assert!((viewport.scale - 0.99).abs() < 1e-12);
        controller.wheel(0.0, &mut viewport);
        assert!((viewport.scale - 0.99).abs() < 1e-12);
    }
}
