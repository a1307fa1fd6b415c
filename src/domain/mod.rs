//! Core domain types for edupulse

mod event;
mod records;

pub use event::{AchievementUnlocked, DomainEvent, EventType, GoalCompleted, ProblemCompleted};
pub use records::{
    Challenge, ProblemPatch, ProblemRecord, ProfileKey, Recommendation, StreakRecord, XpGain,
    XpHistoryEntry, XpRecord,
};
