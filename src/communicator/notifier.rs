//! change notification routing
//! - subscribers register for one stream or all of them
//! - every notify hands one delivery to the dispatcher, subscribers run in registration order
//! - a panicking callback is logged and skipped, a closed channel subscriber is removed

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use uuid::Uuid;
use super::dispatcher::Dispatcher;
use super::entity::{CommunicatorEvent, EventKind};
use crate::{error, trace, warn};

const LOG_TAG: &str = "notifier";

pub type SubscriptionId = Uuid;
pub type Callback = Box<dyn Fn(&CommunicatorEvent) + Send + Sync>;

enum Target {
    Callback(Callback),
    Channel(Mutex<mpsc::Sender<CommunicatorEvent>>),
}

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    target: Target,
}

type Registry = Arc<RwLock<Vec<Arc<Subscription>>>>;

pub struct Notifier {
    subscribers: Registry,
    dispatcher: Box<dyn Dispatcher>,
}

impl Notifier {
    pub fn new(dispatcher: Box<dyn Dispatcher>) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            dispatcher,
        }
    }

    fn add(&self, kind: EventKind, target: Target) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(Subscription { id, kind, target }));
        id
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&CommunicatorEvent) + Send + Sync + 'static,
    {
        self.add(kind, Target::Callback(Box::new(callback)))
    }

    /// events of `kind` arrive on the returned receiver
    pub fn subscribe_channel(&self, kind: EventKind) -> (SubscriptionId, mpsc::Receiver<CommunicatorEvent>) {
        let (tx, rx) = mpsc::channel();
        (self.add(kind, Target::Channel(Mutex::new(tx))), rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove(&self.subscribers, id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn notify(&self, event: CommunicatorEvent) {
        let targets: Vec<Arc<Subscription>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.kind.matches(&event))
            .cloned()
            .collect();
        if targets.is_empty() {
            trace!(LOG_TAG, "no subscriber for {:?}", event);
            return;
        }

        let registry = Arc::clone(&self.subscribers);
        self.dispatcher.dispatch(Box::new(move || deliver(&registry, &targets, &event)));
    }
}

fn remove(registry: &Registry, id: SubscriptionId) -> bool {
    let mut list = registry.write().unwrap_or_else(|e| e.into_inner());
    let before = list.len();
    list.retain(|s| s.id != id);
    list.len() != before
}

fn deliver(registry: &Registry, targets: &[Arc<Subscription>], event: &CommunicatorEvent) {
    for subscription in targets {
        match &subscription.target {
            Target::Callback(callback) => {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                    error!(LOG_TAG, "subscriber {} panicked on {:?}", subscription.id, event);
                }
            }
            Target::Channel(tx) => {
                let sent = tx.lock().unwrap_or_else(|e| e.into_inner()).send(event.clone());
                if sent.is_err() {
                    warn!(LOG_TAG, "subscriber {} closed its channel, removing", subscription.id);
                    remove(registry, subscription.id);
                }
            }
        }
    }
}
