use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use pitwatch_client::config::SUMMARY_LOG_SECS;
use pitwatch_client::telemetry::{HttpTelemetryApi, WsConnector};
use pitwatch_client::{
    AppConfig, AssetMapView, AssetStore, CommandRecorder, LiveSession, LoopConfig, RenderLoop,
    TelemetryClient, TokioScheduler,
};
use tokio::task::LocalSet;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const SURFACE_WIDTH: f64 = 1280.0;
const SURFACE_HEIGHT: f64 = 720.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build runtime: {e}");
            return;
        }
    };

    LocalSet::new().block_on(&runtime, run(config));
}

async fn run(config: AppConfig) {
    info!(api = %config.api_url, channel = %config.ws_url, "starting pitwatch client");

    let api = match HttpTelemetryApi::new(&config.api_url, config.http_timeout) {
        Ok(api) => api,
        Err(e) => {
            error!("invalid API configuration: {e}");
            return;
        }
    };
    let client = TelemetryClient::new(api, WsConnector::new(&config.ws_url), config.client.clone());
    client.on_connection(|event| {
        info!(from = ?event.previous, to = ?event.current, "connection state changed");
    });
    client.on_error(|e| debug!(error = %e, "telemetry error"));

    let store = AssetStore::new(config.trail_cap).into_shared();
    let session = Rc::new(
        LiveSession::start(
            client,
            Rc::clone(&store),
            &config.credentials,
            config.device_page_size,
        )
        .await,
    );
    info!(mode = ?session.mode(), assets = store.borrow().len(), "session ready");

    let view = Rc::new(AssetMapView::new(store, SURFACE_WIDTH, SURFACE_HEIGHT));
    let surface = Rc::new(RefCell::new(CommandRecorder::new(SURFACE_WIDTH, SURFACE_HEIGHT)));
    let live_session = Rc::clone(&session);
    let mut render_loop = RenderLoop::new(
        Rc::clone(&view),
        surface,
        move || live_session.is_live(),
        LoopConfig {
            update_tick: config.update_tick,
            ..LoopConfig::default()
        },
    );
    render_loop.start(&TokioScheduler::new(config.frame_interval));

    let stats = render_loop.stats();
    let mut summary = tokio::time::interval(Duration::from_secs(SUMMARY_LOG_SECS));
    summary.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = run_deadline(config.run_for);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = summary.tick() => {
                let frame = stats.last_frame.get();
                info!(
                    state = ?session.client().state(),
                    assets = view.store().borrow().len(),
                    subscriptions = session.client().subscription_count(),
                    update_ticks = stats.update_ticks.get(),
                    simulated = stats.simulated_ticks.get(),
                    frames = stats.frames_drawn.get(),
                    skipped = stats.frames_skipped.get(),
                    markers = frame.markers,
                    trail_segments = frame.trail_segments,
                    overlays = frame.overlays,
                    draw_commands = frame.draw_commands,
                    "scene summary"
                );
            }
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
            _ = &mut deadline => {
                info!("run duration elapsed");
                break;
            }
        }
    }

    render_loop.stop();
    session.shutdown();
    info!("pitwatch client stopped");
}

fn run_deadline(run_for: Option<Duration>) -> impl Future<Output = ()> {
    async move {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    }
}
