use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use pitwatch_shared::{PushMessage, TsSubCmd};

/// Id of a live subscription; doubles as the wire `cmdId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type TelemetryCallback = Rc<dyn Fn(&PushMessage)>;

#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub device_id: String,
    pub keys: BTreeSet<String>,
    pub callback: TelemetryCallback,
}

impl Subscription {
    pub fn command(&self) -> TsSubCmd {
        TsSubCmd::latest(&self.device_id, self.id.as_str(), self.keys.iter().cloned())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Active subscriptions: the source of truth replayed on every channel open.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    next_seq: u64,
    entries: HashMap<SubscriptionId, Subscription>,
}

impl SubscriptionTable {
    /// Register a subscription under a fresh `{device_id}_{n}` id.
    pub fn register(
        &mut self,
        device_id: &str,
        keys: impl IntoIterator<Item = String>,
        callback: TelemetryCallback,
    ) -> Subscription {
        let id = loop {
            self.next_seq = self.next_seq.wrapping_add(1);
            let candidate = SubscriptionId(format!("{device_id}_{}", self.next_seq));
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
        };
        let subscription = Subscription {
            id: id.clone(),
            device_id: device_id.to_string(),
            keys: keys.into_iter().collect(),
            callback,
        };
        self.entries.insert(id, subscription.clone());
        subscription
    }

    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.entries.get(&SubscriptionId(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<SubscriptionId> {
        self.entries.keys().cloned().collect()
    }

    /// Subscribe commands for every registration, ordered by id.
    pub fn replay_commands(&self) -> Vec<TsSubCmd> {
        let mut commands: Vec<_> = self.entries.values().map(Subscription::command).collect();
        commands.sort_by(|a, b| a.cmd_id.cmp(&b.cmd_id));
        commands
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
