use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use pitwatch_shared::{
    AttributeScope, Attributes, ChannelCommand, Device, DeviceQuery, PushMessage, TimeseriesData,
};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::{ConnectionMachine, ConnectionState, ReconnectBackoff};
use super::events::{
    AuthenticationEvent, ConnectionEvent, DeviceEvent, EventHub, ListenerId, TelemetryEvent,
};
use super::subscriptions::{SubscriptionId, SubscriptionTable};
use super::transport::{ChannelConnector, ChannelEvent, HistoryWindow, TelemetryApi};
use crate::config::{ClientConfig, Credentials};
use crate::error::TelemetryError;

/// Authenticated, reconnecting telemetry client multiplexing subscriptions
/// over one push channel.
///
/// Cheap to clone; clones share one session. Must be driven from inside a
/// [`tokio::task::LocalSet`] because the channel reader and reconnect timer
/// are spawned with [`tokio::task::spawn_local`].
pub struct TelemetryClient<A, C> {
    inner: Rc<Inner<A, C>>,
}

impl<A, C> Clone for TelemetryClient<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

struct Inner<A, C> {
    api: A,
    connector: C,
    config: ClientConfig,
    token: RefCell<Option<String>>,
    machine: RefCell<ConnectionMachine>,
    subscriptions: RefCell<SubscriptionTable>,
    outbound: RefCell<Option<mpsc::UnboundedSender<String>>>,
    /// Bumped whenever a channel is opened or dropped; readers of older channels go quiet.
    epoch: Cell<u64>,
    /// Bumped by every login and teardown; an open that straddles one is discarded.
    session: Cell<u64>,
    opening: Cell<bool>,
    open_finished: Notify,
    backoff: RefCell<ReconnectBackoff>,
    reconnect_task: RefCell<Option<JoinHandle<()>>>,
    reader_task: RefCell<Option<JoinHandle<()>>>,
    shut_down: Cell<bool>,
    shutdown_notify: Notify,
    events: EventHub,
}

impl<A, C> Drop for Inner<A, C> {
    fn drop(&mut self) {
        if let Some(task) = self.reconnect_task.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.reader_task.get_mut().take() {
            task.abort();
        }
    }
}

impl<A, C> TelemetryClient<A, C>
where
    A: TelemetryApi + 'static,
    C: ChannelConnector + 'static,
{
    pub fn new(api: A, connector: C, config: ClientConfig) -> Self {
        let backoff = ReconnectBackoff::new(config.reconnect_base, config.reconnect_max);
        Self {
            inner: Rc::new(Inner {
                api,
                connector,
                config,
                token: RefCell::new(None),
                machine: RefCell::new(ConnectionMachine::default()),
                subscriptions: RefCell::new(SubscriptionTable::default()),
                outbound: RefCell::new(None),
                epoch: Cell::new(0),
                session: Cell::new(0),
                opening: Cell::new(false),
                open_finished: Notify::new(),
                backoff: RefCell::new(backoff),
                reconnect_task: RefCell::new(None),
                reader_task: RefCell::new(None),
                shut_down: Cell::new(false),
                shutdown_notify: Notify::new(),
                events: EventHub::default(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.machine.borrow().state()
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token.borrow().is_some()
    }

    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    pub fn on_connection(&self, listener: impl Fn(&ConnectionEvent) + 'static) -> ListenerId {
        self.inner.events.connection.add(listener)
    }

    pub fn on_authentication(&self, listener: impl Fn(&AuthenticationEvent) + 'static) -> ListenerId {
        self.inner.events.authentication.add(listener)
    }

    pub fn on_telemetry(&self, listener: impl Fn(&TelemetryEvent) + 'static) -> ListenerId {
        self.inner.events.telemetry.add(listener)
    }

    pub fn on_device(&self, listener: impl Fn(&DeviceEvent) + 'static) -> ListenerId {
        self.inner.events.device.add(listener)
    }

    pub fn on_error(&self, listener: impl Fn(&TelemetryError) + 'static) -> ListenerId {
        self.inner.events.error.add(listener)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }

    pub fn active_subscriptions(&self) -> BTreeSet<SubscriptionId> {
        self.inner.subscriptions.borrow().ids()
    }

    /// Log in, retrying with a linearly growing delay. Never returns an error:
    /// the outcome is the return value plus an `authentication` event.
    pub async fn authenticate(&self, credentials: &Credentials) -> bool {
        self.inner.shut_down.set(false);
        self.next_session();
        if let Some(task) = self.inner.reconnect_task.borrow_mut().take() {
            task.abort();
        }
        if self.is_live() {
            self.drop_channel(true);
            self.transition(ConnectionState::Disconnected);
        }
        self.transition(ConnectionState::Connecting);

        let max_retries = self.inner.config.max_retries.max(1);
        let mut attempts = 0;
        let mut last_error = None;
        for attempt in 1..=max_retries {
            attempts = attempt;
            match self.inner.api.login(credentials).await {
                Ok(token) => {
                    *self.inner.token.borrow_mut() = Some(token);
                    self.inner.backoff.borrow_mut().reset();
                    self.transition(ConnectionState::Authenticated);
                    info!(attempt, username = %credentials.username, "authenticated");
                    self.inner.events.authentication.emit(&AuthenticationEvent {
                        success: true,
                        attempts: attempt,
                        error: None,
                    });
                    return true;
                }
                Err(e) => {
                    warn!(attempt, max_retries, error = %e, "login attempt failed");
                    last_error = Some(e);
                }
            }

            if attempt < max_retries {
                let delay = self.inner.config.auth_backoff_step * attempt;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.inner.shutdown_notify.notified() => {}
                }
                if self.inner.shut_down.get() {
                    debug!("login retry cancelled by shutdown");
                    break;
                }
            }
        }

        *self.inner.token.borrow_mut() = None;
        self.transition(ConnectionState::Disconnected);
        let error = last_error
            .unwrap_or_else(|| TelemetryError::Auth("login cancelled".to_string()));
        self.inner.events.authentication.emit(&AuthenticationEvent {
            success: false,
            attempts,
            error: Some(error.clone()),
        });
        self.inner.events.error.emit(&error);
        false
    }

    pub async fn get_devices(
        &self,
        page_size: u32,
        page: u32,
        device_type: Option<&str>,
    ) -> Vec<Device> {
        let query = DeviceQuery {
            page_size,
            page,
            device_type: device_type.map(str::to_string),
        };
        let result = match self.session_token() {
            Ok(token) => self.inner.api.devices(&token, &query).await,
            Err(e) => Err(e),
        };
        let devices = self.fail_soft("device list", result);
        if !devices.is_empty() {
            self.inner.events.device.emit(&DeviceEvent {
                devices: devices.clone(),
            });
        }
        devices
    }

    pub async fn latest_telemetry(&self, device_id: &str, keys: &[String]) -> TimeseriesData {
        let result = match self.session_token() {
            Ok(token) => self.inner.api.latest_telemetry(&token, device_id, keys).await,
            Err(e) => Err(e),
        };
        self.fail_soft("latest telemetry", result)
    }

    pub async fn telemetry_history(
        &self,
        device_id: &str,
        keys: &[String],
        window: HistoryWindow,
    ) -> TimeseriesData {
        let result = match self.session_token() {
            Ok(token) => {
                self.inner
                    .api
                    .telemetry_history(&token, device_id, keys, window)
                    .await
            }
            Err(e) => Err(e),
        };
        self.fail_soft("telemetry history", result)
    }

    pub async fn attributes(&self, device_id: &str, scope: AttributeScope) -> Attributes {
        let result = match self.session_token() {
            Ok(token) => self.inner.api.attributes(&token, device_id, scope).await,
            Err(e) => Err(e),
        };
        self.fail_soft("attributes", result)
    }

    /// Returns whether the write was accepted.
    pub async fn save_attributes(
        &self,
        device_id: &str,
        scope: AttributeScope,
        attributes: &Attributes,
    ) -> bool {
        let result = match self.session_token() {
            Ok(token) => {
                self.inner
                    .api
                    .save_attributes(&token, device_id, scope, attributes)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.report("save attributes", e);
                false
            }
        }
    }

    /// Open the push channel and replay every registered subscription.
    /// A failed open schedules a reconnect; the return value says whether the
    /// channel is live now. Only one open runs at a time: a second caller
    /// waits for the first and reuses its channel.
    pub async fn open_channel(&self) -> bool {
        while self.inner.opening.get() {
            debug!("push channel open already in flight");
            self.inner.open_finished.notified().await;
        }
        if self.inner.shut_down.get() {
            return false;
        }
        if self.is_live() {
            return true;
        }
        let token = match self.session_token() {
            Ok(token) => token,
            Err(e) => {
                self.report("open channel", e);
                return false;
            }
        };
        if let Some(task) = self.inner.reconnect_task.borrow_mut().take() {
            task.abort();
        }
        if self.state() == ConnectionState::Reconnecting {
            self.transition(ConnectionState::Connecting);
        }

        let session = self.inner.session.get();
        self.inner.opening.set(true);
        let _opening = OpeningGuard {
            opening: &self.inner.opening,
            finished: &self.inner.open_finished,
        };
        let result = self.inner.connector.connect(&token).await;
        if self.inner.shut_down.get() || self.inner.session.get() != session {
            debug!("session changed while the push channel was opening; discarding it");
            return false;
        }
        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "push channel open failed");
                self.inner.events.error.emit(&e);
                self.schedule_reconnect();
                return false;
            }
        };
        if self.is_live() {
            debug!("push channel already open; discarding the new one");
            return true;
        }
        if !self.transition(ConnectionState::ChannelOpen) {
            return false;
        }

        let epoch = self.inner.epoch.get().wrapping_add(1);
        self.inner.epoch.set(epoch);
        *self.inner.outbound.borrow_mut() = Some(handle.outbound);
        self.inner.backoff.borrow_mut().reset();
        self.spawn_reader(epoch, handle.inbound);

        let commands = self.inner.subscriptions.borrow().replay_commands();
        let total = commands.len();
        let mut replayed = 0usize;
        for command in commands {
            let cmd_id = command.cmd_id.clone();
            match self.send_command(&cmd_id, &ChannelCommand::subscribe(command)) {
                Ok(()) => replayed += 1,
                Err(e) => debug!(cmd_id = %cmd_id, error = %e, "replay send failed"),
            }
        }
        self.transition(ConnectionState::Subscribed);
        info!(replayed, total, "push channel open");
        true
    }

    /// Register locally, then send the subscribe command if the channel is
    /// live. Otherwise the command is replayed on the next open.
    pub fn subscribe<K>(
        &self,
        device_id: &str,
        keys: impl IntoIterator<Item = K>,
        callback: impl Fn(&PushMessage) + 'static,
    ) -> SubscriptionId
    where
        K: Into<String>,
    {
        let subscription = self.inner.subscriptions.borrow_mut().register(
            device_id,
            keys.into_iter().map(Into::into),
            Rc::new(callback),
        );
        if self.is_live() {
            let command = ChannelCommand::subscribe(subscription.command());
            if let Err(e) = self.send_command(subscription.id.as_str(), &command) {
                debug!(error = %e, "subscribe deferred until the channel reopens");
            }
        } else {
            debug!(cmd_id = %subscription.id, device_id, "subscription registered offline");
        }
        subscription.id
    }

    /// Remove a registration. Unknown ids are ignored; returns whether one was removed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let removed = self.inner.subscriptions.borrow_mut().remove(id);
        if removed.is_none() {
            return false;
        }
        if self.is_live()
            && let Err(e) = self.send_command(id.as_str(), &ChannelCommand::unsubscribe(id.as_str()))
        {
            debug!(error = %e, "unsubscribe not sent");
        }
        true
    }

    /// Tear down: cancel timers, close the channel, forget subscriptions and the token.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        self.inner.shut_down.set(true);
        self.next_session();
        self.inner.shutdown_notify.notify_waiters();
        if let Some(task) = self.inner.reconnect_task.borrow_mut().take() {
            task.abort();
        }
        self.drop_channel(true);
        self.inner.subscriptions.borrow_mut().clear();
        *self.inner.token.borrow_mut() = None;
        self.inner.backoff.borrow_mut().reset();
        self.transition(ConnectionState::Disconnected);
    }

    fn next_session(&self) {
        self.inner.session.set(self.inner.session.get().wrapping_add(1));
    }

    fn session_token(&self) -> Result<String, TelemetryError> {
        self.inner
            .token
            .borrow()
            .clone()
            .ok_or_else(|| TelemetryError::Auth("not authenticated".to_string()))
    }

    fn fail_soft<T: Default>(&self, what: &str, result: Result<T, TelemetryError>) -> T {
        result.unwrap_or_else(|e| {
            self.report(what, e);
            T::default()
        })
    }

    fn report(&self, what: &str, error: TelemetryError) {
        warn!(error = %error, "{what} failed");
        self.inner.events.error.emit(&error);
    }

    /// Apply a state change and announce it. Rejected transitions are logged
    /// and reported as errors.
    fn transition(&self, to: ConnectionState) -> bool {
        let result = self.inner.machine.borrow_mut().transition(to);
        match result {
            Ok(previous) => {
                if previous != to {
                    debug!(?previous, current = ?to, "connection state");
                    self.inner.events.connection.emit(&ConnectionEvent {
                        previous,
                        current: to,
                    });
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "rejected connection transition");
                self.inner.events.error.emit(&e);
                false
            }
        }
    }

    fn send_command(&self, cmd_id: &str, command: &ChannelCommand) -> Result<(), TelemetryError> {
        let text = serde_json::to_string(command)?;
        let outbound = self.inner.outbound.borrow();
        let Some(sender) = outbound.as_ref() else {
            return Err(TelemetryError::Subscription {
                cmd_id: cmd_id.to_string(),
                reason: "channel not open".to_string(),
            });
        };
        sender.send(text).map_err(|_| TelemetryError::Subscription {
            cmd_id: cmd_id.to_string(),
            reason: "channel closed".to_string(),
        })
    }

    fn drop_channel(&self, abort_reader: bool) {
        self.inner.epoch.set(self.inner.epoch.get().wrapping_add(1));
        self.inner.outbound.borrow_mut().take();
        if let Some(task) = self.inner.reader_task.borrow_mut().take()
            && abort_reader
        {
            task.abort();
        }
    }

    fn spawn_reader(&self, epoch: u64, mut inbound: mpsc::UnboundedReceiver<ChannelEvent>) {
        let weak: Weak<Inner<A, C>> = Rc::downgrade(&self.inner);
        let task = tokio::task::spawn_local(async move {
            let reason = loop {
                match inbound.recv().await {
                    Some(ChannelEvent::Message(text)) => {
                        let Some(inner) = weak.upgrade() else {
                            return;
                        };
                        TelemetryClient { inner }.handle_message(epoch, &text);
                    }
                    Some(ChannelEvent::Closed { reason }) => break reason,
                    None => break None,
                }
            };
            if let Some(inner) = weak.upgrade() {
                TelemetryClient { inner }.handle_close(epoch, reason);
            }
        });
        if let Some(previous) = self.inner.reader_task.borrow_mut().replace(task) {
            previous.abort();
        }
    }

    fn handle_message(&self, epoch: u64, text: &str) {
        if epoch != self.inner.epoch.get() {
            return;
        }
        let message: PushMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "undecodable push message");
                self.inner.events.error.emit(&TelemetryError::from(e));
                return;
            }
        };
        let target = self
            .inner
            .subscriptions
            .borrow()
            .get(&message.cmd_id)
            .map(|sub| (sub.device_id.clone(), Rc::clone(&sub.callback)));
        let Some((device_id, callback)) = target else {
            debug!(cmd_id = %message.cmd_id, "dropping push for unknown subscription");
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| callback(&message))).is_err() {
            warn!(cmd_id = %message.cmd_id, "subscription callback panicked; continuing");
        }
        self.inner.events.telemetry.emit(&TelemetryEvent { device_id, message });
    }

    fn handle_close(&self, epoch: u64, reason: Option<String>) {
        if epoch != self.inner.epoch.get() {
            return;
        }
        self.drop_channel(false);
        if self.inner.shut_down.get() {
            return;
        }
        let reason = reason.unwrap_or_else(|| "closed by peer".to_string());
        warn!(%reason, "push channel closed");
        self.inner.events.error.emit(&TelemetryError::Channel(reason));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&self) {
        if self.inner.shut_down.get() || !self.transition(ConnectionState::Reconnecting) {
            return;
        }
        let (attempt, delay) = {
            let mut backoff = self.inner.backoff.borrow_mut();
            let delay = backoff.next_delay();
            (backoff.attempts(), delay)
        };
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling push channel reconnect");

        let weak: Weak<Inner<A, C>> = Rc::downgrade(&self.inner);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let client = TelemetryClient { inner };
            // Detach our own handle so `open_channel` does not abort this task.
            client.inner.reconnect_task.borrow_mut().take();
            client.open_channel().await;
        });
        if let Some(previous) = self.inner.reconnect_task.borrow_mut().replace(task) {
            previous.abort();
        }
    }
}

/// Clears the in-flight open flag however `open_channel` exits, including
/// when its future is dropped mid-connect.
struct OpeningGuard<'a> {
    opening: &'a Cell<bool>,
    finished: &'a Notify,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        self.opening.set(false);
        self.finished.notify_waiters();
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use pitwatch_shared::{
        AttributeScope, Attributes, Device, DeviceQuery, TelemetryValue, TimeseriesData,
    };
    use tokio::sync::mpsc;

    use crate::config::Credentials;
    use crate::error::TelemetryError;
    use crate::telemetry::transport::{
        ChannelConnector, ChannelEvent, ChannelHandle, HistoryWindow, TelemetryApi,
    };

    /// In-memory backend. Accepts one set of credentials and counts logins.
    #[derive(Clone, Default)]
    pub struct FakeApi {
        pub valid: Option<Credentials>,
        pub devices: Vec<Device>,
        pub latest: TimeseriesData,
        pub server_attributes: Attributes,
        pub login_calls: Rc<Cell<u32>>,
        pub saved: Rc<RefCell<Vec<(String, AttributeScope, Attributes)>>>,
    }

    impl FakeApi {
        pub fn accepting(credentials: &Credentials) -> Self {
            Self {
                valid: Some(credentials.clone()),
                ..Self::default()
            }
        }
    }

    impl TelemetryApi for FakeApi {
        async fn login(&self, credentials: &Credentials) -> Result<String, TelemetryError> {
            self.login_calls.set(self.login_calls.get() + 1);
            match &self.valid {
                Some(valid) if valid == credentials => Ok("token-1".to_string()),
                _ => Err(TelemetryError::Auth("HTTP 401 Unauthorized".to_string())),
            }
        }

        async fn devices(&self, _token: &str, query: &DeviceQuery) -> Result<Vec<Device>, TelemetryError> {
            Ok(self
                .devices
                .iter()
                .filter(|d| query.device_type.as_deref().is_none_or(|t| t == d.device_type))
                .cloned()
                .collect())
        }

        async fn latest_telemetry(
            &self,
            _token: &str,
            _device_id: &str,
            keys: &[String],
        ) -> Result<TimeseriesData, TelemetryError> {
            Ok(self
                .latest
                .iter()
                .filter(|(key, _)| keys.contains(key))
                .map(|(key, samples)| (key.clone(), samples.clone()))
                .collect())
        }

        async fn telemetry_history(
            &self,
            _token: &str,
            _device_id: &str,
            _keys: &[String],
            _window: HistoryWindow,
        ) -> Result<TimeseriesData, TelemetryError> {
            Err(TelemetryError::Network("HTTP 503 Service Unavailable".to_string()))
        }

        async fn attributes(
            &self,
            _token: &str,
            _device_id: &str,
            _scope: AttributeScope,
        ) -> Result<Attributes, TelemetryError> {
            Ok(self.server_attributes.clone())
        }

        async fn save_attributes(
            &self,
            _token: &str,
            device_id: &str,
            scope: AttributeScope,
            attributes: &Attributes,
        ) -> Result<(), TelemetryError> {
            self.saved
                .borrow_mut()
                .push((device_id.to_string(), scope, attributes.clone()));
            Ok(())
        }
    }

    pub struct FakeChannel {
        pub to_client: mpsc::UnboundedSender<ChannelEvent>,
        from_client: mpsc::UnboundedReceiver<String>,
        log: Vec<String>,
    }

    impl FakeChannel {
        /// Everything the client has written to this channel so far.
        pub fn sent(&mut self) -> Vec<String> {
            while let Ok(text) = self.from_client.try_recv() {
                self.log.push(text);
            }
            self.log.clone()
        }

        pub fn push(&self, text: impl Into<String>) {
            let _ = self.to_client.send(ChannelEvent::Message(text.into()));
        }

        pub fn close(&self) {
            let _ = self.to_client.send(ChannelEvent::Closed {
                reason: Some("server restart".to_string()),
            });
        }
    }

    /// Records every opened channel; `fail_next` rejects that many opens first.
    #[derive(Clone, Default)]
    pub struct FakeConnector {
        pub channels: Rc<RefCell<Vec<FakeChannel>>>,
        pub fail_next: Rc<Cell<u32>>,
        pub connects: Rc<Cell<u32>>,
    }

    impl FakeConnector {
        pub fn sent(&self, index: usize) -> Vec<String> {
            self.channels.borrow_mut()[index].sent()
        }

        pub fn push(&self, index: usize, text: impl Into<String>) {
            self.channels.borrow()[index].push(text);
        }

        pub fn close(&self, index: usize) {
            self.channels.borrow()[index].close();
        }

        pub fn opened(&self) -> usize {
            self.channels.borrow().len()
        }
    }

    impl ChannelConnector for FakeConnector {
        async fn connect(&self, _token: &str) -> Result<ChannelHandle, TelemetryError> {
            self.connects.set(self.connects.get() + 1);
            if self.fail_next.get() > 0 {
                self.fail_next.set(self.fail_next.get() - 1);
                return Err(TelemetryError::Channel("connection refused".to_string()));
            }
            let (outbound, from_client) = mpsc::unbounded_channel();
            let (to_client, inbound) = mpsc::unbounded_channel();
            self.channels.borrow_mut().push(FakeChannel {
                to_client,
                from_client,
                log: Vec::new(),
            });
            Ok(ChannelHandle { outbound, inbound })
        }
    }

    /// Waits `delay` inside every open before delegating, so opens can overlap.
    #[derive(Clone)]
    pub struct SlowConnector {
        pub inner: FakeConnector,
        pub delay: Duration,
    }

    impl ChannelConnector for SlowConnector {
        async fn connect(&self, token: &str) -> Result<ChannelHandle, TelemetryError> {
            tokio::time::sleep(self.delay).await;
            self.inner.connect(token).await
        }
    }

    pub fn sample(key: &str, ts: i64, value: impl Into<TelemetryValue>) -> (String, Vec<(i64, TelemetryValue)>) {
        (key.to_string(), vec![(ts, value.into())])
    }
}
