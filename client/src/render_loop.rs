use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::trace;

use crate::renderer::{FrameMetrics, Surface};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::store::SimulationParams;
use crate::view::{AssetMapView, AssetVisualization, FrameKey};

/// Counters the runner reports from.
#[derive(Debug, Default)]
pub struct LoopStats {
    pub update_ticks: Cell<u64>,
    pub simulated_ticks: Cell<u64>,
    pub frames_drawn: Cell<u64>,
    pub frames_skipped: Cell<u64>,
    pub last_frame: Cell<FrameMetrics>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub update_tick: Duration,
    pub simulation: SimulationParams,
    /// Fixed seed for the offline random walk; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            update_tick: Duration::from_millis(crate::config::DEFAULT_UPDATE_TICK_MS),
            simulation: SimulationParams::default(),
            seed: None,
        }
    }
}

/// Two independent cadences over one map view.
///
/// The update tick random-walks the store while no live channel feeds it.
/// The frame tick redraws while `playing`, skipping frames whose inputs have
/// not changed since the last draw. Both timers are cancelled on
/// [`RenderLoop::stop`] and on drop.
pub struct RenderLoop {
    view: Rc<AssetMapView>,
    surface: Rc<RefCell<dyn Surface>>,
    live: Rc<dyn Fn() -> bool>,
    config: LoopConfig,
    stats: Rc<LoopStats>,
    last_key: Rc<RefCell<Option<FrameKey>>>,
    update_timer: Option<TimerHandle>,
    frame_timer: Option<TimerHandle>,
}

impl RenderLoop {
    pub fn new(
        view: Rc<AssetMapView>,
        surface: Rc<RefCell<dyn Surface>>,
        live: impl Fn() -> bool + 'static,
        config: LoopConfig,
    ) -> Self {
        Self {
            view,
            surface,
            live: Rc::new(live),
            config,
            stats: Rc::new(LoopStats::default()),
            last_key: Rc::new(RefCell::new(None)),
            update_timer: None,
            frame_timer: None,
        }
    }

    pub fn stats(&self) -> Rc<LoopStats> {
        Rc::clone(&self.stats)
    }

    pub fn view(&self) -> &Rc<AssetMapView> {
        &self.view
    }

    pub fn is_running(&self) -> bool {
        self.update_timer.is_some() || self.frame_timer.is_some()
    }

    pub fn set_playing(&self, playing: bool) {
        self.view.set_playing(playing);
    }

    /// Start both cadences. Restarting cancels the previous timers first.
    pub fn start(&mut self, scheduler: &dyn Scheduler) {
        self.stop();

        let view = Rc::clone(&self.view);
        let live = Rc::clone(&self.live);
        let stats = Rc::clone(&self.stats);
        let params = self.config.simulation;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.update_timer = Some(scheduler.every(
            self.config.update_tick,
            Box::new(move || {
                stats.update_ticks.set(stats.update_ticks.get() + 1);
                if live() {
                    return;
                }
                let now = chrono::Utc::now().timestamp_millis();
                let touched = view.store().borrow_mut().simulate_tick(&mut rng, &params, now);
                stats.simulated_ticks.set(stats.simulated_ticks.get() + 1);
                trace!(touched, "offline tick");
            }),
        ));

        let view = Rc::clone(&self.view);
        let surface = Rc::clone(&self.surface);
        let stats = Rc::clone(&self.stats);
        let last_key = Rc::clone(&self.last_key);
        self.frame_timer = Some(scheduler.on_frame(Box::new(move || {
            if !view.toggles().playing {
                return;
            }
            let key = view.frame_key();
            if last_key.borrow().as_ref() == Some(&key) {
                stats.frames_skipped.set(stats.frames_skipped.get() + 1);
                return;
            }
            let metrics = view.draw(&mut *surface.borrow_mut());
            *last_key.borrow_mut() = Some(key);
            stats.frames_drawn.set(stats.frames_drawn.get() + 1);
            stats.last_frame.set(metrics);
        })));
    }

    /// Cancel both cadences. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut timer) = self.update_timer.take() {
            timer.cancel();
        }
        if let Some(mut timer) = self.frame_timer.take() {
            timer.cancel();
        }
        self.last_key.borrow_mut().take();
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pitwatch_shared::demo_fleet;

    use super::*;
    use crate::renderer::CommandRecorder;
    use crate::scheduler::ManualScheduler;
    use crate::store::AssetStore;

    fn fixture(live: Rc<Cell<bool>>) -> (RenderLoop, ManualScheduler, Rc<RefCell<CommandRecorder>>) {
        let store = AssetStore::with_assets(demo_fleet(), 20).into_shared();
        let view = Rc::new(AssetMapView::new(store, 800.0, 600.0));
        let surface = Rc::new(RefCell::new(CommandRecorder::new(800.0, 600.0)));
        let config = LoopConfig {
            seed: Some(7),
            ..LoopConfig::default()
        };
        let render_loop = RenderLoop::new(view, surface.clone(), move || live.get(), config);
        (render_loop, ManualScheduler::new(), surface)
    }

    #[test]
    fn offline_ticks_fill_trails_to_capacity() {
        let (mut render_loop, scheduler, _) = fixture(Rc::new(Cell::new(false)));
        render_loop.start(&scheduler);

        scheduler.advance(Duration::from_millis(2_000) * 50);

        let stats = render_loop.stats();
        assert_eq!(stats.simulated_ticks.get(), 50);
        let store = render_loop.view().store().borrow();
        let hauler = store.get("HT-101").expect("demo hauler");
        assert_eq!(hauler.trail.len(), 20);
        let conveyor = store.get("CV-501").expect("demo conveyor");
        assert!(conveyor.trail.is_empty());
    }

    #[test]
    fn live_channel_suppresses_simulation() {
        let live = Rc::new(Cell::new(true));
        let (mut render_loop, scheduler, _) = fixture(live.clone());
        render_loop.start(&scheduler);
        let before = render_loop.view().store().borrow().revision();

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(render_loop.stats().update_ticks.get(), 5);
        assert_eq!(render_loop.stats().simulated_ticks.get(), 0);
        assert_eq!(render_loop.view().store().borrow().revision(), before);

        live.set(false);
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(render_loop.stats().simulated_ticks.get(), 1);
    }

    #[test]
    fn paused_loop_keeps_updating_but_stops_drawing() {
        let (mut render_loop, scheduler, surface) = fixture(Rc::new(Cell::new(false)));
        render_loop.start(&scheduler);

        scheduler.frame();
        assert_eq!(render_loop.stats().frames_drawn.get(), 1);
        assert!(!surface.borrow().commands().is_empty());

        render_loop.set_playing(false);
        surface.borrow_mut().clear();
        scheduler.advance(Duration::from_secs(2));
        scheduler.frame();
        assert_eq!(render_loop.stats().frames_drawn.get(), 1);
        assert_eq!(render_loop.stats().simulated_ticks.get(), 1);
        assert!(surface.borrow().commands().is_empty());

        render_loop.set_playing(true);
        scheduler.frame();
        assert_eq!(render_loop.stats().frames_drawn.get(), 2);
    }

    #[test]
    fn unchanged_frames_are_skipped() {
        let (mut render_loop, scheduler, _) = fixture(Rc::new(Cell::new(true)));
        render_loop.start(&scheduler);
        scheduler.frame();
        scheduler.frame();
        assert_eq!(render_loop.stats().frames_drawn.get(), 1);
        assert_eq!(render_loop.stats().frames_skipped.get(), 1);

        render_loop.view().reset_view();
        render_loop.view().wheel(-1.0);
        scheduler.frame();
        assert_eq!(render_loop.stats().frames_drawn.get(), 2);
    }

    #[test]
    fn stop_cancels_both_cadences() {
        let (mut render_loop, scheduler, _) = fixture(Rc::new(Cell::new(false)));
        render_loop.start(&scheduler);
        assert_eq!(scheduler.active(), 2);

        render_loop.stop();
        render_loop.stop();
        assert!(!render_loop.is_running());
        assert_eq!(scheduler.active(), 0);
        scheduler.advance(Duration::from_secs(10));
        scheduler.frame();
        assert_eq!(render_loop.stats().simulated_ticks.get(), 0);
        assert_eq!(render_loop.stats().frames_drawn.get(), 0);
    }

    #[test]
    fn dropping_the_loop_cancels_timers() {
        let (mut render_loop, scheduler, _) = fixture(Rc::new(Cell::new(false)));
        render_loop.start(&scheduler);
        drop(render_loop);
        assert_eq!(scheduler.active(), 0);
    }
}
