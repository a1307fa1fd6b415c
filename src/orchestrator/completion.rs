//! `problem_completed` handling

use anyhow::Context;
use tracing::{debug, info, warn};

use super::{CompletionReport, MatchedProblem, Orchestrator, SkipReason, Step, StepOutcome};
use crate::domain::{ProblemCompleted, ProblemPatch, ProblemRecord, ProfileKey, XpGain};
use crate::matcher::MatchTier;
use crate::notify::ProgressNotification;
use crate::rewards::{advance_streak, xp_gain, Difficulty};

impl Orchestrator {
    /// Apply a completed problem to XP, streak, goals, challenges and the
    /// problem record.
    ///
    /// Each step runs whether or not earlier steps failed. A problem that is
    /// already solved earns no XP again.
    pub async fn on_problem_completed(
        &self,
        user_id: &str,
        payload: ProblemCompleted,
    ) -> CompletionReport {
        let key = ProfileKey::new(user_id, payload.profile_id.clone());

        let resolved = self
            .guard(&key, Step::Resolve, self.resolve_problem(&key, &payload.problem_text))
            .await;
        let resolve = if resolved.is_some() {
            StepOutcome::Done
        } else {
            StepOutcome::Failed
        };
        let resolved = resolved.flatten();
        let already_solved = resolved.as_ref().is_some_and(|(p, _)| p.is_solved());

        let xp = if already_solved {
            debug!(user_id, "Problem already solved; no XP awarded");
            StepOutcome::Skipped(SkipReason::AlreadySolved)
        } else {
            self.guard(&key, Step::Xp, self.award_xp(&key, &payload))
                .await
                .unwrap_or(StepOutcome::Failed)
        };

        let streak = self
            .guard(&key, Step::Streak, self.update_streak(&key))
            .await
            .unwrap_or(StepOutcome::Failed);

        let goals = self
            .guard(&key, Step::Goals, async {
                self.collaborators
                    .goals
                    .check_goals_for_problem(user_id, &payload.problem_type, key.profile_id())
                    .await
                    .map(|()| StepOutcome::Done)
            })
            .await
            .unwrap_or(StepOutcome::Failed);

        let challenge = self.generate_challenge(&key, &payload).await;

        let mark_solved = match &resolved {
            Some((problem, _)) if problem.is_solved() => {
                StepOutcome::Skipped(SkipReason::AlreadySolved)
            }
            Some((problem, _)) => self
                .guard(&key, Step::MarkSolved, self.mark_solved(&key, problem))
                .await
                .unwrap_or(StepOutcome::Failed),
            None if resolve.is_failed() => StepOutcome::Skipped(SkipReason::ProblemUnresolved),
            None => StepOutcome::Skipped(SkipReason::NoMatchingProblem),
        };

        self.notifier
            .notify(ProgressNotification::StreakUpdated { key: key.clone() });

        CompletionReport {
            resolve,
            matched: resolved.map(|(problem, tier)| MatchedProblem {
                already_solved: problem.is_solved(),
                problem_id: problem.id,
                tier: tier.as_str(),
            }),
            xp,
            streak,
            goals,
            challenge,
            mark_solved,
        }
    }

    async fn resolve_problem(
        &self,
        key: &ProfileKey,
        text: &str,
    ) -> anyhow::Result<Option<(ProblemRecord, MatchTier)>> {
        let problems = self
            .collaborators
            .store
            .get_problems(key)
            .await
            .context("Failed to load problems")?;

        let Some(found) = self.matcher.resolve(key, &problems, text) else {
            debug!(user_id = %key.user_id, candidates = problems.len(), "No stored problem matched");
            return Ok(None);
        };

        debug!(
            user_id = %key.user_id,
            problem_id = %found.problem.id,
            tier = found.tier.as_str(),
            "Resolved completed problem"
        );
        Ok(Some((found.problem.clone(), found.tier)))
    }

    async fn award_xp(
        &self,
        key: &ProfileKey,
        payload: &ProblemCompleted,
    ) -> anyhow::Result<StepOutcome> {
        let store = &self.collaborators.store;
        let Some(mut record) = store
            .get_xp_data(key)
            .await
            .context("Failed to load XP record")?
        else {
            info!(user_id = %key.user_id, profile_id = ?key.profile_id, "No XP record; skipping XP award");
            return Ok(StepOutcome::Skipped(SkipReason::NoXpRecord));
        };

        let difficulty =
            Difficulty::resolve(payload.difficulty.as_deref(), self.rewards.default_difficulty);
        let amount = xp_gain(difficulty, payload.hints_used.unwrap_or(0), &self.rewards);
        let reason = format!("Solved {} problem", payload.problem_type);

        let old_level = record.level;
        record.total_xp = record.total_xp.saturating_add(amount);
        let progress = self.curve.progress(record.total_xp);
        record.level = progress.level;
        record.xp_to_next_level = progress.xp_to_next_level;
        record.merge_history(self.clock.today(), amount, &reason);
        record.push_recent_gain(
            XpGain {
                timestamp: self.clock.now(),
                xp: amount,
                reason: reason.clone(),
            },
            self.rewards.recent_gains_limit,
        );

        store
            .update_xp_data(key, &record)
            .await
            .context("Failed to save XP record")?;

        info!(
            user_id = %key.user_id,
            profile_id = ?key.profile_id,
            amount,
            total_xp = record.total_xp,
            level = record.level,
            "Awarded XP"
        );
        self.notifier.notify(ProgressNotification::XpAwarded {
            key: key.clone(),
            amount,
            total_xp: record.total_xp,
            reason,
        });
        if record.level > old_level {
            self.notifier.notify(ProgressNotification::LevelUp {
                key: key.clone(),
                old_level,
                new_level: record.level,
            });
        }
        Ok(StepOutcome::Done)
    }

    async fn update_streak(&self, key: &ProfileKey) -> anyhow::Result<StepOutcome> {
        let store = &self.collaborators.store;
        let record = match store
            .get_streak_data(key)
            .await
            .context("Failed to load streak record")?
        {
            Some(record) => record,
            None => store
                .create_default_streak_data(key)
                .await
                .context("Failed to create streak record")?,
        };

        let Some(next) = advance_streak(&record, self.clock.today()) else {
            debug!(user_id = %key.user_id, "Streak already counted today");
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyCountedToday));
        };

        store
            .update_streak_data(key, &next)
            .await
            .context("Failed to save streak record")?;

        info!(
            user_id = %key.user_id,
            profile_id = ?key.profile_id,
            current = next.current_streak,
            longest = next.longest_streak,
            "Updated streak"
        );
        Ok(StepOutcome::Done)
    }

    async fn generate_challenge(&self, key: &ProfileKey, payload: &ProblemCompleted) -> StepOutcome {
        if self.settings.background_challenges {
            let generator = self.collaborators.challenges.clone();
            let user_id = key.user_id.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                if let Err(e) = generator.generate_challenge(&user_id, &payload).await {
                    warn!(
                        user_id = %user_id,
                        step = Step::Challenge.as_str(),
                        error = %format!("{e:#}"),
                        "Background challenge generation failed"
                    );
                }
            });
            return StepOutcome::Spawned;
        }

        self.guard(key, Step::Challenge, async {
            self.collaborators
                .challenges
                .generate_challenge(&key.user_id, payload)
                .await
                .map(|challenge| {
                    debug!(user_id = %key.user_id, challenge_id = %challenge.id, "Generated challenge");
                    StepOutcome::Done
                })
        })
        .await
        .unwrap_or(StepOutcome::Failed)
    }

    async fn mark_solved(
        &self,
        key: &ProfileKey,
        problem: &ProblemRecord,
    ) -> anyhow::Result<StepOutcome> {
        self.collaborators
            .store
            .update_problem(&key.user_id, &problem.id, &ProblemPatch::solved(self.clock.now()))
            .await
            .with_context(|| format!("Failed to mark problem {} solved", problem.id))?;

        info!(user_id = %key.user_id, problem_id = %problem.id, "Marked problem solved");
        self.notifier.notify(ProgressNotification::ProblemSolved {
            key: key.clone(),
            problem_id: problem.id.clone(),
        });
        Ok(StepOutcome::Done)
    }
}
