//! Configuration loading and management

mod io;
mod settings;

pub use settings::{BaseXp, BusSettings, MatcherSettings, OrchestratorSettings, RewardSettings};

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// XP, level and streak constants
    #[serde(default)]
    pub rewards: RewardSettings,

    /// Problem matching heuristics
    #[serde(default)]
    pub matcher: MatcherSettings,

    /// Event bus settings
    #[serde(default)]
    pub bus: BusSettings,

    /// Completion orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}
