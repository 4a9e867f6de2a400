//! Event Bus implementation.
//!
//! Each controller owns its own [`EventBus`]; there is no process-wide instance,
//! so two devices never see each other's events.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory};

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0.simple())
    }
}

/// Which events a handler is interested in
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Every event.
    #[default]
    All,
    /// Events whose category is listed.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check whether `event` passes the filter
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            Self::All => true,
            Self::Categories(wanted) => wanted.contains(&event.category()),
        }
    }
}

type Handler = Arc<dyn Fn(AppEvent) + Send + Sync>;

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Capacity of the broadcast channel feeding async receivers.
    ///
    /// Receivers that fall further behind than this lose the oldest events.
    pub channel_capacity: usize,
    /// Number of most recent events kept for [`EventBus::recent`]; 0 keeps none.
    pub recent_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            recent_capacity: 0,
        }
    }
}

/// Error returned by [`EventBus::publish`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventBusError {
    /// Neither a handler nor a receiver saw the event
    #[error("No active subscribers")]
    NoSubscribers,
}

/// Distributes [`AppEvent`]s to synchronous handlers and async receivers
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
    handlers: RwLock<HashMap<SubscriptionId, (EventFilter, Handler)>>,
    recent: Mutex<VecDeque<AppEvent>>,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a bus with default settings
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with `config`
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
            recent: Mutex::new(VecDeque::with_capacity(config.recent_capacity)),
            config,
        }
    }

    /// Publish `event`.
    ///
    /// Matching handlers run on the calling thread once the handler table is
    /// unlocked, so a handler may publish, subscribe or unsubscribe. Returns
    /// how many async receivers got the event.
    pub fn publish(&self, event: AppEvent) -> Result<usize, EventBusError> {
        self.remember(&event);

        let matching: Vec<Handler> = {
            let handlers = self.handlers.read();
            handlers
                .values()
                .filter(|(filter, _)| filter.matches(&event))
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        let delivered = !matching.is_empty();

        for handler in &matching {
            handler(event.clone());
        }

        match self.sender.send(event) {
            Ok(receivers) => Ok(receivers),
            Err(_) if delivered => Ok(0),
            Err(_) => Err(EventBusError::NoSubscribers),
        }
    }

    /// Register `handler` for events passing `filter`
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Arc::new(handler)));
        tracing::trace!("{} subscribed", id);
        id
    }

    /// Remove a handler; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::trace!("{} unsubscribed", id);
        }
        removed
    }

    /// Receiver for async consumers
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Most recent events, oldest first
    pub fn recent(&self) -> Vec<AppEvent> {
        self.recent.lock().iter().cloned().collect()
    }

    pub fn clear_recent(&self) {
        self.recent.lock().clear();
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn remember(&self, event: &AppEvent) {
        let limit = self.config.recent_capacity;
        if limit == 0 {
            return;
        }
        let mut recent = self.recent.lock();
        if recent.len() == limit {
            recent.pop_front();
        }
        recent.push_back(event.clone());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .field("config", &self.config)
            .finish()
    }
}
