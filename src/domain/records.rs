//! Persisted progress records
//!
//! These are the shapes exchanged with the persistence gateway. All of them are
//! keyed by [`ProfileKey`]; the orchestrator never invents keys on its own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifies whose progress a record belongs to.
///
/// `profile_id = None` is the account owner's own progress, `Some` is a child
/// profile under that account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileKey {
    pub user_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
}

impl ProfileKey {
    pub fn new(user_id: impl Into<String>, profile_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            profile_id,
        }
    }

    /// Key for the account owner's own progress
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self::new(user_id, None)
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }
}

impl std::fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.profile_id {
            Some(profile) => write!(f, "{}/{}", self.user_id, profile),
            None => write!(f, "{}", self.user_id),
        }
    }
}

/// One calendar day of XP gains (same-day gains are merged)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpHistoryEntry {
    pub date: NaiveDate,
    pub xp: u32,
    pub reason: String,
}

/// A single XP award, kept for "recent activity" displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpGain {
    pub timestamp: DateTime<Utc>,
    pub xp: u32,
    pub reason: String,
}

/// XP state for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpRecord {
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub level: u32,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: u32,
    #[serde(default)]
    pub history: Vec<XpHistoryEntry>,
    #[serde(default)]
    pub recent_gains: Vec<XpGain>,
}

impl Default for XpRecord {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            xp_to_next_level: 100,
            history: Vec::new(),
            recent_gains: Vec::new(),
        }
    }
}

impl XpRecord {
    /// Add `xp` to today's history entry, or start a new entry for today
    pub fn merge_history(&mut self, today: NaiveDate, xp: u32, reason: &str) {
        match self.history.last_mut() {
            Some(entry) if entry.date == today => {
                entry.xp = entry.xp.saturating_add(xp);
                entry.reason = reason.to_string();
            }
            _ => self.history.push(XpHistoryEntry {
                date: today,
                xp,
                reason: reason.to_string(),
            }),
        }
    }

    /// Record a gain, keeping at most `limit` of the newest entries
    pub fn push_recent_gain(&mut self, gain: XpGain, limit: usize) {
        self.recent_gains.push(gain);
        if self.recent_gains.len() > limit {
            let excess = self.recent_gains.len() - limit;
            self.recent_gains.drain(..excess);
        }
    }
}

/// Daily study streak for one profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_study_date: Option<NaiveDate>,
}

/// A problem created by the tutoring flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub problem_type: String,
    #[serde(default)]
    pub solved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
}

impl ProblemRecord {
    pub fn is_solved(&self) -> bool {
        self.solved_at.is_some()
    }

    /// Whether this problem belongs to the given user/profile
    pub fn belongs_to(&self, key: &ProfileKey) -> bool {
        self.user_id == key.user_id && self.profile_id == key.profile_id
    }
}

/// Partial update applied to a [`ProblemRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_at: Option<DateTime<Utc>>,
}

impl ProblemPatch {
    pub fn solved(at: DateTime<Utc>) -> Self {
        Self { solved_at: Some(at) }
    }
}

/// A subject suggested after a goal is completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub subject: String,
    pub reason: String,
}

/// A social challenge produced from a completed problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub problem_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_merge_history_same_day_accumulates() {
        let mut record = XpRecord::default();
        record.merge_history(day(1), 10, "Solved algebra problem");
        record.merge_history(day(1), 6, "Solved geometry problem");

        assert_eq!(record.history.len(), 1);
        assert_eq!(record.history[0].xp, 16);
        assert_eq!(record.history[0].reason, "Solved geometry problem");
    }

    #[test]
    fn test_merge_history_new_day_appends() {
        let mut record = XpRecord::default();
        record.merge_history(day(1), 10, "a");
        record.merge_history(day(2), 5, "b");

        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[1].date, day(2));
    }

    #[test]
    fn test_recent_gains_are_capped_to_newest() {
        let mut record = XpRecord::default();
        for xp in 1..=5 {
            let gain = XpGain {
                timestamp: Utc::now(),
                xp,
                reason: format!("gain {xp}"),
            };
            record.push_recent_gain(gain, 3);
        }
        let kept: Vec<u32> = record.recent_gains.iter().map(|g| g.xp).collect();
        assert_eq!(kept, vec![3, 4, 5]);
    }

    #[test]
    fn test_xp_record_uses_wire_field_names() {
        let json = serde_json::to_value(XpRecord::default()).unwrap();
        assert!(json.get("totalXP").is_some());
        assert!(json.get("xpToNextLevel").is_some());
        assert!(json.get("recentGains").is_some());
    }

    #[test]
    fn test_profile_key_display() {
        assert_eq!(ProfileKey::owner("u1").to_string(), "u1");
        assert_eq!(
            ProfileKey::new("u1", Some("kid".to_string())).to_string(),
            "u1/kid"
        );
    }
}
