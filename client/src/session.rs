use std::cell::{Cell, RefCell};

use pitwatch_shared::fleet::asset_from_device;
use pitwatch_shared::{
    Asset, AssetStatus, AttributeScope, Attributes, Device, Position, demo_fleet,
};
use tracing::{info, warn};

use crate::config::Credentials;
use crate::store::{POSITION_X_KEY, POSITION_Y_KEY, Reading, STATUS_KEY, SharedStore};
use crate::telemetry::{ChannelConnector, SubscriptionId, TelemetryApi, TelemetryClient};

/// Where the store's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Backend devices, fed by the push channel.
    Live,
    /// Demo fleet, fed by the offline simulator.
    Offline,
}

/// Connects a [`TelemetryClient`] to an asset store for one session.
pub struct LiveSession<A, C> {
    client: TelemetryClient<A, C>,
    store: SharedStore,
    mode: Cell<SessionMode>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

impl<A, C> LiveSession<A, C>
where
    A: TelemetryApi + 'static,
    C: ChannelConnector + 'static,
{
    /// Authenticate and seed the store from the backend, falling back to the
    /// demo fleet when login fails or the backend lists no devices.
    pub async fn start(
        client: TelemetryClient<A, C>,
        store: SharedStore,
        credentials: &Credentials,
        page_size: u32,
    ) -> Self {
        let session = Self {
            client,
            store,
            mode: Cell::new(SessionMode::Offline),
            subscriptions: RefCell::new(Vec::new()),
        };

        if !session.client.authenticate(credentials).await {
            warn!("authentication unavailable; running on the demo fleet");
            session.seed_demo();
            return session;
        }

        let devices = session.client.get_devices(page_size, 0, None).await;
        if devices.is_empty() {
            warn!("backend listed no devices; running on the demo fleet");
            session.seed_demo();
            return session;
        }

        session.seed_from_devices(&devices).await;
        session.client.open_channel().await;
        session.subscribe_all(&devices);
        session.mode.set(SessionMode::Live);
        info!(devices = devices.len(), live = session.client.is_live(), "live session started");
        session
    }

    pub fn mode(&self) -> SessionMode {
        self.mode.get()
    }

    pub fn client(&self) -> &TelemetryClient<A, C> {
        &self.client
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Whether the push channel currently feeds the store.
    pub fn is_live(&self) -> bool {
        self.mode.get() == SessionMode::Live && self.client.is_live()
    }

    pub fn shutdown(&self) {
        for id in self.subscriptions.borrow_mut().drain(..) {
            self.client.unsubscribe(&id);
        }
        self.client.shutdown();
    }

    fn seed_demo(&self) {
        self.store.borrow_mut().reset(demo_fleet());
        self.mode.set(SessionMode::Offline);
    }

    async fn seed_from_devices(&self, devices: &[Device]) {
        let mut assets = Vec::with_capacity(devices.len());
        let mut latest = Vec::with_capacity(devices.len());
        for device in devices {
            let mut asset = asset_from_device(device);
            let attributes = self.client.attributes(&device.id, AttributeScope::Server).await;
            apply_attributes(&mut asset, &attributes);

            let keys: Vec<String> = asset
                .category
                .metric_keys()
                .iter()
                .map(|key| key.to_string())
                .collect();
            let data = self.client.latest_telemetry(&device.id, &keys).await;
            latest.push((device.id.clone(), Reading::latest_of(&data)));
            assets.push(asset);
        }

        let mut store = self.store.borrow_mut();
        store.reset(assets);
        for (id, readings) in latest {
            store.apply_readings(&id, &readings);
        }
    }

    fn subscribe_all(&self, devices: &[Device]) {
        let mut ids = self.subscriptions.borrow_mut();
        for device in devices {
            let category = self
                .store
                .borrow()
                .get(&device.id)
                .map(|asset| asset.category);
            let Some(category) = category else {
                continue;
            };
            let keys = category
                .metric_keys()
                .iter()
                .copied()
                .chain([POSITION_X_KEY, POSITION_Y_KEY, STATUS_KEY]);
            let store = SharedStore::clone(&self.store);
            let device_id = device.id.clone();
            let id = self.client.subscribe(&device.id, keys, move |message| {
                store
                    .borrow_mut()
                    .apply_readings(&device_id, &Reading::from_push(message));
            });
            ids.push(id);
        }
    }
}

/// Position and status from the device's server-side attributes.
fn apply_attributes(asset: &mut Asset, attributes: &Attributes) {
    let x = attributes.get(POSITION_X_KEY).and_then(|v| v.as_f64());
    let y = attributes.get(POSITION_Y_KEY).and_then(|v| v.as_f64());
    if let (Some(x), Some(y)) = (x, y) {
        asset.position = Position::new(x, y).clamped();
    }
    if let Some(status) = attributes
        .get(STATUS_KEY)
        .and_then(|v| v.as_str())
        .and_then(AssetStatus::parse)
    {
        asset.status = status;
    }
}
