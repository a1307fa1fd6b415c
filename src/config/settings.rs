//! Settings sections of the configuration file

use serde::{Deserialize, Serialize};

use crate::rewards::Difficulty;

/// Base XP awarded per difficulty before the hint penalty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseXp {
    #[serde(default = "default_elementary_xp")]
    pub elementary: u32,
    #[serde(default = "default_middle_xp")]
    pub middle: u32,
    #[serde(default = "default_high_xp")]
    pub high: u32,
    #[serde(default = "default_advanced_xp")]
    pub advanced: u32,
}

impl BaseXp {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Elementary => self.elementary,
            Difficulty::Middle => self.middle,
            Difficulty::High => self.high,
            Difficulty::Advanced => self.advanced,
        }
    }
}

impl Default for BaseXp {
    fn default() -> Self {
        Self {
            elementary: default_elementary_xp(),
            middle: default_middle_xp(),
            high: default_high_xp(),
            advanced: default_advanced_xp(),
        }
    }
}

fn default_elementary_xp() -> u32 {
    5
}

fn default_middle_xp() -> u32 {
    10
}

fn default_high_xp() -> u32 {
    15
}

fn default_advanced_xp() -> u32 {
    20
}

/// XP and level constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSettings {
    #[serde(default)]
    pub base_xp: BaseXp,

    /// XP subtracted per hint used
    #[serde(default = "default_hint_penalty")]
    pub hint_penalty: u32,

    /// Floor for a single award, whatever the hint count
    #[serde(default = "default_minimum_xp")]
    pub minimum_xp: u32,

    /// Difficulty assumed when a completion carries none (or an unknown one)
    #[serde(default = "default_difficulty")]
    pub default_difficulty: Difficulty,

    /// XP needed to leave level 1
    #[serde(default = "default_level_base_xp")]
    pub level_base_xp: u32,

    /// Per-level growth of the level thresholds
    #[serde(default = "default_level_growth")]
    pub level_growth: f64,

    /// How many entries `recentGains` keeps
    #[serde(default = "default_recent_gains_limit")]
    pub recent_gains_limit: usize,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            base_xp: BaseXp::default(),
            hint_penalty: default_hint_penalty(),
            minimum_xp: default_minimum_xp(),
            default_difficulty: default_difficulty(),
            level_base_xp: default_level_base_xp(),
            level_growth: default_level_growth(),
            recent_gains_limit: default_recent_gains_limit(),
        }
    }
}

fn default_hint_penalty() -> u32 {
    2
}

fn default_minimum_xp() -> u32 {
    5
}

fn default_difficulty() -> Difficulty {
    Difficulty::Middle
}

fn default_level_base_xp() -> u32 {
    100
}

fn default_level_growth() -> f64 {
    1.5
}

fn default_recent_gains_limit() -> usize {
    10
}

/// Problem matching heuristics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherSettings {
    /// Number of leading characters compared by the prefix tier
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            prefix_chars: default_prefix_chars(),
        }
    }
}

fn default_prefix_chars() -> usize {
    50
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    /// Events retained for diagnostics before the oldest is evicted
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    100
}

/// Completion orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Subjects requested from the recommendation engine after a goal completes
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Spawn challenge generation instead of awaiting it on the completion path
    #[serde(default)]
    pub background_challenges: bool,

    /// Buffered notifications per observer before slow observers start lagging
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            recommendation_count: default_recommendation_count(),
            background_challenges: false,
            notification_capacity: default_notification_capacity(),
        }
    }
}

fn default_recommendation_count() -> usize {
    3
}

fn default_notification_capacity() -> usize {
    64
}
