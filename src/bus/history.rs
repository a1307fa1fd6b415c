//! Bounded ring buffer of published events, for diagnostics only

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::{DomainEvent, EventType};

/// Filter for [`EventBus::history`](super::EventBus::history)
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub event_type: Option<EventType>,
    pub actor_id: Option<String>,
    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn of_type(event_type: EventType) -> Self {
        Self {
            event_type: Some(event_type),
            ..Self::default()
        }
    }

    pub fn for_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &DomainEvent) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type)
            && self
                .actor_id
                .as_deref()
                .is_none_or(|actor| actor == event.actor_id)
    }
}

pub(super) struct EventHistory {
    capacity: usize,
    events: Mutex<VecDeque<DomainEvent>>,
}

impl EventHistory {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, evicting the oldest events beyond capacity
    pub(super) fn record(&self, event: DomainEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.lock().expect("event history lock poisoned");
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Matching events, oldest first
    pub(super) fn query(&self, filter: &HistoryFilter) -> Vec<DomainEvent> {
        let events = self.events.lock().expect("event history lock poisoned");
        let mut matched: Vec<DomainEvent> = events
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        matched.reverse();
        matched
    }
}
