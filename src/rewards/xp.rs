//! XP awarded for a completed problem

use serde::{Deserialize, Serialize};

use crate::config::RewardSettings;

/// Problem difficulty as reported by the tutoring flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Elementary,
    Middle,
    High,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elementary => "elementary",
            Self::Middle => "middle",
            Self::High => "high",
            Self::Advanced => "advanced",
        }
    }

    /// Parse a difficulty label, case-insensitively.
    ///
    /// Accepts the "middle school" / "high school" spellings the tutoring
    /// flow sometimes produces.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "elementary" | "elementary_school" => Some(Self::Elementary),
            "middle" | "middle_school" => Some(Self::Middle),
            "high" | "high_school" => Some(Self::High),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    /// Resolve an optional label, falling back when it is absent or unknown
    pub fn resolve(label: Option<&str>, fallback: Difficulty) -> Self {
        label.and_then(Self::parse).unwrap_or(fallback)
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XP for one completed problem: base XP for the difficulty minus the hint
/// penalty, never below the configured minimum.
pub fn xp_gain(difficulty: Difficulty, hints_used: u32, settings: &RewardSettings) -> u32 {
    let base = settings.base_xp.for_difficulty(difficulty);
    let penalty = settings.hint_penalty.saturating_mul(hints_used);
    base.saturating_sub(penalty).max(settings.minimum_xp)
}
