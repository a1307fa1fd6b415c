//! Streak tracking system
//!
//! Tracks consecutive study days per profile.

use chrono::NaiveDate;

use crate::domain::StreakRecord;

/// How a completion affected the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Already studied today
    Unchanged,
    /// Studied yesterday, streak grows by one
    Extended,
    /// First study day, or the streak was broken
    Restarted,
}

impl StreakChange {
    pub fn classify(last_study_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match last_study_date {
            Some(last) if last == today => Self::Unchanged,
            Some(last) if today.pred_opt() == Some(last) => Self::Extended,
            _ => Self::Restarted,
        }
    }
}

/// Apply a study session on `today` to a streak.
///
/// Returns `None` when the streak was already counted today and nothing needs
/// persisting.
pub fn advance_streak(record: &StreakRecord, today: NaiveDate) -> Option<StreakRecord> {
    let current_streak = match StreakChange::classify(record.last_study_date, today) {
        StreakChange::Unchanged => return None,
        StreakChange::Extended => record.current_streak.saturating_add(1),
        StreakChange::Restarted => 1,
    };

    Some(StreakRecord {
        current_streak,
        longest_streak: record.longest_streak.max(current_streak),
        last_study_date: Some(today),
    })
}
