//! Contracts for everything the orchestrator talks to
//!
//! The data store and the goal/recommendation/challenge services live outside
//! this crate. The orchestrator only sees these traits; [`MemoryGateway`]
//! implements all of them in-process for the CLI and for tests.

mod memory;

pub use memory::{MemoryGateway, Operation, ProfileState, Snapshot};

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Challenge, ProblemCompleted, ProblemPatch, ProblemRecord, ProfileKey, Recommendation,
    StreakRecord, XpRecord,
};

/// Error type for persistence gateway calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Write rejected: {0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Read/write access to persisted progress records
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// `Ok(None)` when the profile has no XP record yet
    async fn get_xp_data(&self, key: &ProfileKey) -> GatewayResult<Option<XpRecord>>;

    async fn update_xp_data(&self, key: &ProfileKey, record: &XpRecord) -> GatewayResult<()>;

    /// `Ok(None)` when the profile has no streak record yet
    async fn get_streak_data(&self, key: &ProfileKey) -> GatewayResult<Option<StreakRecord>>;

    async fn update_streak_data(
        &self,
        key: &ProfileKey,
        record: &StreakRecord,
    ) -> GatewayResult<()>;

    /// Create and return a zeroed streak record
    async fn create_default_streak_data(&self, key: &ProfileKey) -> GatewayResult<StreakRecord>;

    /// Problems owned by the user/profile
    async fn get_problems(&self, key: &ProfileKey) -> GatewayResult<Vec<ProblemRecord>>;

    async fn update_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        patch: &ProblemPatch,
    ) -> GatewayResult<()>;
}

/// Evaluates learning goals after a problem is solved
#[async_trait]
pub trait GoalChecker: Send + Sync {
    async fn check_goals_for_problem(
        &self,
        user_id: &str,
        problem_type: &str,
        profile_id: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Suggests what to study next
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn get_subject_recommendations(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
        count: usize,
    ) -> anyhow::Result<Vec<Recommendation>>;
}

/// Turns a solved problem into a social challenge
#[async_trait]
pub trait ChallengeGenerator: Send + Sync {
    async fn generate_challenge(
        &self,
        user_id: &str,
        payload: &ProblemCompleted,
    ) -> anyhow::Result<Challenge>;
}

/// The full set of collaborators an orchestrator needs
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ProgressStore>,
    pub goals: Arc<dyn GoalChecker>,
    pub recommendations: Arc<dyn RecommendationEngine>,
    pub challenges: Arc<dyn ChallengeGenerator>,
}

impl Collaborators {
    /// Use one value for every role
    pub fn from_shared<T>(gateway: Arc<T>) -> Self
    where
        T: ProgressStore + GoalChecker + RecommendationEngine + ChallengeGenerator + 'static,
    {
        Self {
            store: gateway.clone(),
            goals: gateway.clone(),
            recommendations: gateway.clone(),
            challenges: gateway,
        }
    }
}
