use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of domain event carried by the [`EventBus`](crate::bus::EventBus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A learner finished a problem
    ProblemCompleted,
    /// An achievement was unlocked
    AchievementUnlocked,
    /// A learning goal was completed
    GoalCompleted,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::ProblemCompleted,
        EventType::AchievementUnlocked,
        EventType::GoalCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProblemCompleted => "problem_completed",
            Self::AchievementUnlocked => "achievement_unlocked",
            Self::GoalCompleted => "goal_completed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown event type: {s}"))
    }
}

/// An immutable notification broadcast on the event bus.
///
/// The payload stays untyped on the bus; handlers deserialize it into the
/// shape they expect (see [`ProblemCompleted`] and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// User that caused the event
    pub actor_id: String,

    /// Child profile the event belongs to (None = account owner)
    #[serde(default)]
    pub profile_id: Option<String>,

    pub payload: serde_json::Value,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        actor_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            actor_id: actor_id.into(),
            profile_id: None,
            payload,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the profile this event belongs to
    pub fn for_profile(mut self, profile_id: Option<String>) -> Self {
        self.profile_id = profile_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Deserialize the payload into a typed shape
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            anyhow::anyhow!("malformed {} payload from {}: {e}", self.event_type, self.actor_id)
        })
    }
}

/// Payload of a `problem_completed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemCompleted {
    pub problem_text: String,
    pub problem_type: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub hints_used: Option<u32>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

/// Payload of an `achievement_unlocked` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementUnlocked {
    pub achievement_id: String,
    pub achievement_name: String,
    #[serde(default)]
    pub profile_id: Option<String>,
}

/// Payload of a `goal_completed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalCompleted {
    pub goal_id: String,
    pub goal_type: String,
    pub target_subject: String,
    #[serde(default)]
    pub profile_id: Option<String>,
}
