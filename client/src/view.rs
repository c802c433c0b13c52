use std::cell::{Cell, RefCell};

use pitwatch_shared::Asset;

use crate::interaction::{InteractionController, PointerDown};
use crate::renderer::{CanvasRenderer, FrameMetrics, MapToggles, Surface};
use crate::store::SharedStore;
use crate::telemetry::{ListenerId, Listeners};
use crate::viewport::{ScreenPoint, Viewport};

/// What a host embeds: selection events, toggles, view reset, and the asset list.
/// Alternate renderers implement this to be swapped in.
pub trait AssetVisualization {
    fn on_asset_click(&self, callback: Box<dyn Fn(&Asset)>) -> ListenerId;

    fn toggles(&self) -> MapToggles;

    fn set_toggles(&self, toggles: MapToggles);

    fn reset_view(&self);

    fn assets(&self) -> Vec<Asset>;

    fn selected(&self) -> Option<String>;
}

/// Inputs that decide whether a frame would differ from the last one drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameKey {
    revision: u64,
    viewport: Viewport,
    toggles: MapToggles,
    selected: Option<String>,
}

/// The 2D map: store, viewport, interaction, and renderer wired together.
pub struct AssetMapView {
    store: SharedStore,
    viewport: RefCell<Viewport>,
    interaction: RefCell<InteractionController>,
    toggles: Cell<MapToggles>,
    renderer: CanvasRenderer,
    clicks: Listeners<Asset>,
}

impl AssetMapView {
    pub fn new(store: SharedStore, width: f64, height: f64) -> Self {
        Self {
            store,
            viewport: RefCell::new(Viewport::new(width, height)),
            interaction: RefCell::new(InteractionController::default()),
            toggles: Cell::new(MapToggles::default()),
            renderer: CanvasRenderer::new(),
            clicks: Listeners::new("asset-click"),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.borrow().clone()
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.viewport.borrow_mut().resize(width, height);
    }

    pub fn set_playing(&self, playing: bool) {
        self.update_toggles(|t| t.playing = playing);
    }

    pub fn set_show_trails(&self, show: bool) {
        self.update_toggles(|t| t.show_trails = show);
    }

    pub fn set_show_telemetry(&self, show: bool) {
        self.update_toggles(|t| t.show_telemetry = show);
    }

    fn update_toggles(&self, f: impl FnOnce(&mut MapToggles)) {
        let mut toggles = self.toggles.get();
        f(&mut toggles);
        self.toggles.set(toggles);
    }

    /// Select the asset under the pointer, or start a pan-drag.
    pub fn pointer_down(&self, x: f64, y: f64) -> PointerDown {
        let outcome = {
            let store = self.store.borrow();
            let viewport = self.viewport.borrow();
            self.interaction
                .borrow_mut()
                .pointer_down(ScreenPoint::new(x, y), &store, &viewport)
        };
        if let PointerDown::Selected(id) = &outcome {
            let asset = self.store.borrow().get(id).cloned();
            if let Some(asset) = asset {
                self.clicks.emit(&asset);
            }
        }
        outcome
    }

    pub fn pointer_move(&self, x: f64, y: f64) -> bool {
        let mut viewport = self.viewport.borrow_mut();
        self.interaction
            .borrow_mut()
            .pointer_move(ScreenPoint::new(x, y), &mut viewport)
    }

    pub fn pointer_up(&self) {
        self.interaction.borrow_mut().pointer_up();
    }

    pub fn wheel(&self, delta_y: f64) {
        let mut viewport = self.viewport.borrow_mut();
        self.interaction.borrow_mut().wheel(delta_y, &mut viewport);
    }

    pub fn frame_key(&self) -> FrameKey {
        FrameKey {
            revision: self.store.borrow().revision(),
            viewport: self.viewport(),
            toggles: self.toggles.get(),
            selected: self.selected(),
        }
    }

    /// Paint the current state. Ignores `playing`; gating is the render loop's job.
    pub fn draw(&self, surface: &mut dyn Surface) -> FrameMetrics {
        let store = self.store.borrow();
        let viewport = self.viewport.borrow();
        let interaction = self.interaction.borrow();
        self.renderer.draw(
            store.assets(),
            &viewport,
            self.toggles.get(),
            interaction.selected(),
            surface,
        )
    }
}

impl AssetVisualization for AssetMapView {
    fn on_asset_click(&self, callback: Box<dyn Fn(&Asset)>) -> ListenerId {
        self.clicks.add(callback)
    }

    fn toggles(&self) -> MapToggles {
        self.toggles.get()
    }

    fn set_toggles(&self, toggles: MapToggles) {
        self.toggles.set(toggles);
    }

    fn reset_view(&self) {
        self.viewport.borrow_mut().reset();
    }

    fn assets(&self) -> Vec<Asset> {
        self.store.borrow().snapshot()
    }

    fn selected(&self) -> Option<String> {
        self.interaction.borrow().selected().map(str::to_string)
    }
}
