//! In-process event bus
//!
//! Typed publish/subscribe for [`DomainEvent`]s with a bounded diagnostic
//! history.
//!
//! # Delivery
//!
//! `publish` records the event, then runs every handler registered for its
//! type concurrently and waits for all of them. A handler that returns an
//! error or panics is logged and counted; it never stops its siblings and
//! never surfaces to the publisher.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new();
//! let sub = bus.subscribe(EventType::GoalCompleted, |event| async move {
//!     tracing::info!(actor = %event.actor_id, "goal done");
//!     Ok(())
//! });
//!
//! bus.publish(EventType::GoalCompleted, "user-1", payload, PublishOptions::default())
//!     .await;
//! sub.unsubscribe();
//! ```

mod history;

pub use history::HistoryFilter;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::config::BusSettings;
use crate::domain::{DomainEvent, EventType};
use history::EventHistory;

type Handler = Arc<dyn Fn(DomainEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Registered {
    id: u64,
    handler: Handler,
}

struct BusInner {
    handlers: RwLock<HashMap<EventType, Vec<Registered>>>,
    history: EventHistory,
    next_id: AtomicU64,
}

/// Optional fields attached to a published event
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub profile_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl PublishOptions {
    pub fn for_profile(profile_id: Option<String>) -> Self {
        Self {
            profile_id,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// What happened when an event was published
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub event: DomainEvent,
    /// Handlers that ran
    pub handlers: usize,
    /// Handlers that returned an error or panicked
    pub failures: usize,
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping it keeps the handler registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    event_type: EventType,
    id: u64,
}

impl Subscription {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Remove the handler. Returns false if the bus is gone or the handler was
    /// already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut handlers = bus.handlers.write().expect("bus handler lock poisoned");
        let Some(list) = handlers.get_mut(&self.event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != self.id);
        let removed = list.len() != before;
        if removed {
            debug!(event_type = %self.event_type, subscription = self.id, "Handler unsubscribed");
        }
        removed
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner")
            .field("history_capacity", &self.history.capacity())
            .finish_non_exhaustive()
    }
}

/// Event bus shared by publishers and the orchestrator.
///
/// Cloning is cheap; clones share handlers and history.
#[derive(Clone, Debug)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default history capacity
    pub fn new() -> Self {
        Self::from_settings(&BusSettings::default())
    }

    pub fn from_settings(settings: &BusSettings) -> Self {
        Self::with_history_capacity(settings.history_capacity)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                history: EventHistory::new(capacity),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a handler for one event type
    pub fn subscribe<F, Fut>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler = Arc::new(move |event| handler(event).boxed());

        self.inner
            .handlers
            .write()
            .expect("bus handler lock poisoned")
            .entry(event_type)
            .or_default()
            .push(Registered { id, handler });

        debug!(event_type = %event_type, subscription = id, "Handler subscribed");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            event_type,
            id,
        }
    }

    /// Build an event and deliver it to every handler of its type
    pub async fn publish(
        &self,
        event_type: EventType,
        actor_id: impl Into<String>,
        payload: serde_json::Value,
        options: PublishOptions,
    ) -> PublishReport {
        let event = DomainEvent::new(event_type, actor_id, payload)
            .for_profile(options.profile_id)
            .with_metadata(options.metadata);
        self.publish_event(event).await
    }

    /// Serialize a typed payload and publish it
    pub async fn publish_payload<T: Serialize>(
        &self,
        event_type: EventType,
        actor_id: impl Into<String>,
        payload: &T,
        options: PublishOptions,
    ) -> anyhow::Result<PublishReport> {
        let payload = serde_json::to_value(payload)?;
        Ok(self.publish(event_type, actor_id, payload, options).await)
    }

    /// Deliver an already-built event
    pub async fn publish_event(&self, event: DomainEvent) -> PublishReport {
        self.inner.history.record(event.clone());

        let handlers: Vec<(u64, Handler)> = self
            .inner
            .handlers
            .read()
            .expect("bus handler lock poisoned")
            .get(&event.event_type)
            .map(|list| list.iter().map(|r| (r.id, r.handler.clone())).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            trace!(event_type = %event.event_type, "No handlers for event");
            return PublishReport {
                event,
                handlers: 0,
                failures: 0,
            };
        }

        let runs = handlers.into_iter().map(|(id, handler)| {
            let event = event.clone();
            async move {
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;
                (id, outcome)
            }
        });

        let mut failures = 0;
        let results = join_all(runs).await;
        let count = results.len();
        for (id, outcome) in results {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(
                        event_type = %event.event_type,
                        event_id = %event.id,
                        subscription = id,
                        error = %format!("{e:#}"),
                        "Event handler failed"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        event_type = %event.event_type,
                        event_id = %event.id,
                        subscription = id,
                        panic = panic_message(&*panic),
                        "Event handler panicked"
                    );
                }
            }
        }

        debug!(
            event_type = %event.event_type,
            handlers = count,
            failures,
            "Event delivered"
        );
        PublishReport {
            event,
            handlers: count,
            failures,
        }
    }

    /// Query the recent-event ring buffer
    pub fn history(&self, filter: &HistoryFilter) -> Vec<DomainEvent> {
        self.inner.history.query(filter)
    }

    /// Number of handlers currently registered for `event_type`
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.inner
            .handlers
            .read()
            .expect("bus handler lock poisoned")
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
