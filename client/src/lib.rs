//! Live asset telemetry map: a reconnecting telemetry client feeding an
//! in-memory asset store, rendered through a pan/zoom viewport.

pub mod colors;
pub mod config;
pub mod error;
pub mod interaction;
pub mod render_loop;
pub mod renderer;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod view;
pub mod viewport;

pub use config::{AppConfig, ClientConfig, Credentials};
pub use error::TelemetryError;
pub use render_loop::{LoopConfig, LoopStats, RenderLoop};
pub use renderer::{CanvasRenderer, CommandRecorder, FrameMetrics, MapToggles, Surface};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use session::{LiveSession, SessionMode};
pub use store::{AssetStore, SharedStore};
pub use telemetry::{ConnectionState, LiveTelemetryClient, TelemetryClient};
pub use view::{AssetMapView, AssetVisualization};
pub use viewport::Viewport;
