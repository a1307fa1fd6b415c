//! Per-step outcomes of a completion

use serde::Serialize;

/// Orchestration steps, used as the `step` field in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Resolve,
    Xp,
    Streak,
    Goals,
    Challenge,
    MarkSolved,
    Recommendations,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve_problem",
            Self::Xp => "xp",
            Self::Streak => "streak",
            Self::Goals => "goal_check",
            Self::Challenge => "challenge",
            Self::MarkSolved => "mark_solved",
            Self::Recommendations => "recommendations",
        }
    }
}

/// Why a step did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The matched problem already has `solved_at`
    AlreadySolved,
    /// The profile has no XP record
    NoXpRecord,
    /// The streak already counted today
    AlreadyCountedToday,
    /// No stored problem matched the completion
    NoMatchingProblem,
    /// Resolution failed, so there is nothing to mark
    ProblemUnresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    Skipped(SkipReason),
    /// Handed to a background task
    Spawned,
    /// Error or panic; details are in the log
    Failed,
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// The problem a completion was matched to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedProblem {
    pub problem_id: String,
    pub tier: &'static str,
    pub already_solved: bool,
}

/// What `on_problem_completed` did, step by step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub resolve: StepOutcome,
    pub matched: Option<MatchedProblem>,
    pub xp: StepOutcome,
    pub streak: StepOutcome,
    pub goals: StepOutcome,
    pub challenge: StepOutcome,
    pub mark_solved: StepOutcome,
}

impl CompletionReport {
    /// Steps that failed
    pub fn failures(&self) -> Vec<Step> {
        [
            (Step::Resolve, self.resolve),
            (Step::Xp, self.xp),
            (Step::Streak, self.streak),
            (Step::Goals, self.goals),
            (Step::Challenge, self.challenge),
            (Step::MarkSolved, self.mark_solved),
        ]
        .into_iter()
        .filter(|(_, outcome)| outcome.is_failed())
        .map(|(step, _)| step)
        .collect()
    }
}
