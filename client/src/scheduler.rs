use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// Cancellation handle for a scheduled task. Cancelling more than once is
/// harmless; dropping the handle cancels too.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Source of the two cadences a render loop needs: fixed-period ticks and
/// per-frame callbacks.
pub trait Scheduler {
    fn every(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle;

    fn on_frame(&self, task: Box<dyn FnMut()>) -> TimerHandle;
}

/// Drives tasks on the current [`tokio::task::LocalSet`]. Frames are a
/// fixed-period interval.
#[derive(Debug, Clone, Copy)]
pub struct TokioScheduler {
    frame_interval: Duration,
}

impl TokioScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: Box<dyn FnMut()>) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                task();
            }
        });
        TimerHandle::new(move || handle.abort())
    }

    fn on_frame(&self, task: Box<dyn FnMut()>) -> TimerHandle {
        self.every(self.frame_interval, task)
    }
}

type SharedTask = Rc<RefCell<Box<dyn FnMut()>>>;

struct ManualTimer {
    /// `None` for frame tasks.
    period: Option<Duration>,
    next_due: Duration,
    task: SharedTask,
    cancelled: Rc<Cell<bool>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    timers: Vec<ManualTimer>,
}

/// Deterministic scheduler: time only moves on [`ManualScheduler::advance`]
/// and frames only fire on [`ManualScheduler::frame`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Tasks that have not been cancelled.
    pub fn active(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.timers.retain(|timer| !timer.cancelled.get());
        state.timers.len()
    }

    /// Move time forward, firing every periodic task that comes due, in due order.
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now + by;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                state.timers.retain(|timer| !timer.cancelled.get());
                let due = state
                    .timers
                    .iter_mut()
                    .filter(|timer| timer.period.is_some() && timer.next_due <= target)
                    .min_by_key(|timer| timer.next_due);
                match due {
                    Some(timer) => {
                        let at = timer.next_due;
                        if let Some(period) = timer.period {
                            timer.next_due += period;
                        }
                        Some((at, Rc::clone(&timer.task), Rc::clone(&timer.cancelled)))
                    }
                    None => None,
                }
            };
            let Some((at, task, cancelled)) = next else {
                break;
            };
            self.state.borrow_mut().now = at;
            if !cancelled.get() {
                (task.borrow_mut())();
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Fire every frame task once.
    pub fn frame(&self) {
        let tasks: Vec<_> = self
            .state
            .borrow()
            .timers
            .iter()
            .filter(|timer| timer.period.is_none())
            .map(|timer| (Rc::clone(&timer.task), Rc::clone(&timer.cancelled)))
            .collect();
        for (task, cancelled) in tasks {
            if !cancelled.get() {
                (task.borrow_mut())();
            }
        }
    }

    fn schedule(&self, period: Option<Duration>, task: Box<dyn FnMut()>) -> TimerHandle {
        let cancelled = Rc::new(Cell::new(false));
        let mut state = self.state.borrow_mut();
        let next_due = state.now + period.unwrap_or_default();
        state.timers.push(ManualTimer {
            period,
            next_due,
            task: Rc::new(RefCell::new(task)),
            cancelled: Rc::clone(&cancelled),
        });
        TimerHandle::new(move || cancelled.set(true))
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle {
        self.schedule(Some(period.max(Duration::from_millis(1))), task)
    }

    fn on_frame(&self, task: Box<dyn FnMut()>) -> TimerHandle {
        self.schedule(None, task)
    }
}
