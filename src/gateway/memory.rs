//! In-process gateway
//!
//! Holds every record in memory behind a mutex, counts calls per operation and
//! can be told to fail specific operations. The CLI seeds it from a JSON
//! fixture; tests use it to observe what the orchestrator did.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ChallengeGenerator, GatewayError, GatewayResult, GoalChecker, ProgressStore,
    RecommendationEngine,
};
use crate::domain::{
    Challenge, ProblemCompleted, ProblemPatch, ProblemRecord, ProfileKey, Recommendation,
    StreakRecord, XpRecord,
};

/// Gateway operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetXp,
    UpdateXp,
    GetStreak,
    UpdateStreak,
    CreateStreak,
    GetProblems,
    UpdateProblem,
    CheckGoals,
    Recommend,
    GenerateChallenge,
}

/// XP and streak state of one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    pub user_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub xp: Option<XpRecord>,
    #[serde(default)]
    pub streak: Option<StreakRecord>,
}

impl ProfileState {
    fn key(&self) -> ProfileKey {
        ProfileKey::new(self.user_id.clone(), self.profile_id.clone())
    }
}

/// A goal evaluation the gateway was asked to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalCheck {
    pub user_id: String,
    pub problem_type: String,
    #[serde(default)]
    pub profile_id: Option<String>,
}

/// Serializable view of everything the gateway holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub profiles: Vec<ProfileState>,
    #[serde(default)]
    pub problems: Vec<ProblemRecord>,
    /// Catalogue served by the recommendation engine
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub goal_checks: Vec<GoalCheck>,
}

#[derive(Default)]
struct MemoryState {
    xp: HashMap<ProfileKey, XpRecord>,
    streaks: HashMap<ProfileKey, StreakRecord>,
    problems: Vec<ProblemRecord>,
    recommendations: Vec<Recommendation>,
    challenges: Vec<Challenge>,
    goal_checks: Vec<GoalCheck>,
}

#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    calls: Mutex<HashMap<Operation, usize>>,
    failing: Mutex<HashSet<Operation>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state();
            for profile in snapshot.profiles {
                let key = profile.key();
                if let Some(xp) = profile.xp {
                    state.xp.insert(key.clone(), xp);
                }
                if let Some(streak) = profile.streak {
                    state.streaks.insert(key, streak);
                }
            }
            state.problems = snapshot.problems;
            state.recommendations = snapshot.recommendations;
            state.challenges = snapshot.challenges;
            state.goal_checks = snapshot.goal_checks;
        }
        gateway
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        let mut keys: Vec<&ProfileKey> = state.xp.keys().chain(state.streaks.keys()).collect();
        keys.sort_by(|a, b| (&a.user_id, &a.profile_id).cmp(&(&b.user_id, &b.profile_id)));
        keys.dedup();

        let profiles = keys
            .into_iter()
            .map(|key| ProfileState {
                user_id: key.user_id.clone(),
                profile_id: key.profile_id.clone(),
                xp: state.xp.get(key).cloned(),
                streak: state.streaks.get(key).cloned(),
            })
            .collect();

        Snapshot {
            profiles,
            problems: state.problems.clone(),
            recommendations: state.recommendations.clone(),
            challenges: state.challenges.clone(),
            goal_checks: state.goal_checks.clone(),
        }
    }

    pub fn insert_xp(&self, key: ProfileKey, record: XpRecord) {
        self.state().xp.insert(key, record);
    }

    pub fn insert_streak(&self, key: ProfileKey, record: StreakRecord) {
        self.state().streaks.insert(key, record);
    }

    pub fn insert_problem(&self, problem: ProblemRecord) {
        self.state().problems.push(problem);
    }

    pub fn set_recommendations(&self, recommendations: Vec<Recommendation>) {
        self.state().recommendations = recommendations;
    }

    pub fn xp(&self, key: &ProfileKey) -> Option<XpRecord> {
        self.state().xp.get(key).cloned()
    }

    pub fn streak(&self, key: &ProfileKey) -> Option<StreakRecord> {
        self.state().streaks.get(key).cloned()
    }

    pub fn problem(&self, id: &str) -> Option<ProblemRecord> {
        self.state().problems.iter().find(|p| p.id == id).cloned()
    }

    pub fn goal_checks(&self) -> Vec<GoalCheck> {
        self.state().goal_checks.clone()
    }

    pub fn challenges(&self) -> Vec<Challenge> {
        self.state().challenges.clone()
    }

    /// Make every later call of `op` fail
    pub fn fail(&self, op: Operation) {
        self.failing.lock().expect("gateway lock poisoned").insert(op);
    }

    pub fn recover(&self, op: Operation) {
        self.failing.lock().expect("gateway lock poisoned").remove(&op);
    }

    /// How many times `op` was attempted, failed attempts included
    pub fn calls(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .expect("gateway lock poisoned")
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("gateway lock poisoned")
    }

    /// Count the call and apply failure injection
    fn enter(&self, op: Operation) -> GatewayResult<()> {
        *self
            .calls
            .lock()
            .expect("gateway lock poisoned")
            .entry(op)
            .or_default() += 1;

        if self.failing.lock().expect("gateway lock poisoned").contains(&op) {
            return Err(GatewayError::Unavailable(format!("{op:?} failure injected")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryGateway {
    async fn get_xp_data(&self, key: &ProfileKey) -> GatewayResult<Option<XpRecord>> {
        self.enter(Operation::GetXp)?;
        Ok(self.xp(key))
    }

    async fn update_xp_data(&self, key: &ProfileKey, record: &XpRecord) -> GatewayResult<()> {
        self.enter(Operation::UpdateXp)?;
        self.state().xp.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn get_streak_data(&self, key: &ProfileKey) -> GatewayResult<Option<StreakRecord>> {
        self.enter(Operation::GetStreak)?;
        Ok(self.streak(key))
    }

    async fn update_streak_data(
        &self,
        key: &ProfileKey,
        record: &StreakRecord,
    ) -> GatewayResult<()> {
        self.enter(Operation::UpdateStreak)?;
        self.state().streaks.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn create_default_streak_data(&self, key: &ProfileKey) -> GatewayResult<StreakRecord> {
        self.enter(Operation::CreateStreak)?;
        let record = StreakRecord::default();
        self.state().streaks.insert(key.clone(), record.clone());
        Ok(record)
    }

    async fn get_problems(&self, key: &ProfileKey) -> GatewayResult<Vec<ProblemRecord>> {
        self.enter(Operation::GetProblems)?;
        Ok(self
            .state()
            .problems
            .iter()
            .filter(|p| p.belongs_to(key))
            .cloned()
            .collect())
    }

    async fn update_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        patch: &ProblemPatch,
    ) -> GatewayResult<()> {
        self.enter(Operation::UpdateProblem)?;
        let mut state = self.state();
        let problem = state
            .problems
            .iter_mut()
            .find(|p| p.id == problem_id && p.user_id == user_id)
            .ok_or_else(|| GatewayError::NotFound {
                kind: "problem",
                id: problem_id.to_string(),
            })?;

        if let Some(solved_at) = patch.solved_at {
            problem.solved_at = Some(solved_at);
        }
        Ok(())
    }
}

#[async_trait]
impl GoalChecker for MemoryGateway {
    async fn check_goals_for_problem(
        &self,
        user_id: &str,
        problem_type: &str,
        profile_id: Option<&str>,
    ) -> anyhow::Result<()> {
        self.enter(Operation::CheckGoals)?;
        self.state().goal_checks.push(GoalCheck {
            user_id: user_id.to_string(),
            problem_type: problem_type.to_string(),
            profile_id: profile_id.map(str::to_string),
        });
        Ok(())
    }
}

#[async_trait]
impl RecommendationEngine for MemoryGateway {
    async fn get_subject_recommendations(
        &self,
        _user_id: &str,
        _profile_id: Option<&str>,
        count: usize,
    ) -> anyhow::Result<Vec<Recommendation>> {
        self.enter(Operation::Recommend)?;
        Ok(self
            .state()
            .recommendations
            .iter()
            .take(count)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChallengeGenerator for MemoryGateway {
    async fn generate_challenge(
        &self,
        _user_id: &str,
        payload: &ProblemCompleted,
    ) -> anyhow::Result<Challenge> {
        self.enter(Operation::GenerateChallenge)?;
        let challenge = Challenge {
            id: uuid::Uuid::new_v4().to_string(),
            title: format!("Can you beat my {} problem?", payload.problem_type),
            problem_type: payload.problem_type.clone(),
        };
        self.state().challenges.push(challenge.clone());
        Ok(challenge)
    }
}
