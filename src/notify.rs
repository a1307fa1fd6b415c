//! Observer notifications
//!
//! Lightweight, best-effort signals for UI observers so they can refresh
//! progress widgets without polling. Nothing is acknowledged; with no
//! observers attached a notification is simply dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::{DomainEvent, ProfileKey, Recommendation};

/// Progress changes observers may want to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressNotification {
    /// XP was added to a profile
    XpAwarded {
        key: ProfileKey,
        amount: u32,
        total_xp: u32,
        reason: String,
    },
    /// An XP award crossed one or more level thresholds
    LevelUp {
        key: ProfileKey,
        old_level: u32,
        new_level: u32,
    },
    /// Completion processing finished; streak widgets should refresh
    StreakUpdated { key: ProfileKey },
    /// A stored problem was marked solved
    ProblemSolved { key: ProfileKey, problem_id: String },
    /// Subjects suggested after a goal was completed
    Recommendations {
        key: ProfileKey,
        recommendations: Vec<Recommendation>,
    },
    /// An achievement or goal event re-published for observers
    Forwarded { event: DomainEvent },
}

impl ProgressNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::XpAwarded { .. } => "xp_awarded",
            Self::LevelUp { .. } => "level_up",
            Self::StreakUpdated { .. } => "streak_updated",
            Self::ProblemSolved { .. } => "problem_solved",
            Self::Recommendations { .. } => "recommendations",
            Self::Forwarded { .. } => "forwarded",
        }
    }
}

/// Broadcast channel for [`ProgressNotification`]s
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ProgressNotification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl Notifier {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire and forget
    pub fn notify(&self, notification: ProgressNotification) {
        trace!(kind = notification.kind(), "Progress notification");
        // No observers is fine.
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressNotification> {
        self.sender.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
