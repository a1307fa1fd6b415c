//! End-to-end tests for the completion orchestrator

mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use edupulse::bus::{HistoryFilter, PublishOptions};
use edupulse::config::Config;
use edupulse::gateway::{Collaborators, Operation};
use edupulse::notify::ProgressNotification;
use edupulse::orchestrator::{SkipReason, Step, StepOutcome};
use edupulse::{EventType, Recommendation};

const TEXT: &str = "Simplify 12/16 and explain each step you took to reach the simplest form.";

fn completion_payload(text: &str) -> serde_json::Value {
    json!({
        "problemText": text,
        "problemType": "fractions",
        "difficulty": "middle",
        "hintsUsed": 1,
    })
}

async fn publish_completion(h: &Harness, text: &str) -> edupulse::bus::PublishReport {
    h.bus
        .publish(
            EventType::ProblemCompleted,
            USER,
            completion_payload(text),
            PublishOptions::for_profile(Some(PROFILE.to_string())),
        )
        .await
}

#[tokio::test]
async fn test_completion_awards_xp_and_marks_problem_solved() {
    let mut h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(95, 1, 5));
    h.gateway.insert_problem(problem("p1", TEXT, at(8)));

    let report = publish_completion(&h, TEXT).await;
    assert_eq!(report.handlers, 1);
    assert_eq!(report.failures, 0);

    // middle (10) - 1 hint (2) = 8
    let xp = h.gateway.xp(&key()).unwrap();
    assert_eq!(xp.total_xp, 103);
    assert_eq!(xp.level, 2);
    assert_eq!(xp.xp_to_next_level, 147);
    assert_eq!(xp.history.len(), 1);
    assert_eq!(xp.history[0].date, today());
    assert_eq!(xp.history[0].xp, 8);
    assert_eq!(xp.history[0].reason, "Solved fractions problem");
    assert_eq!(xp.recent_gains.len(), 1);

    let solved = h.gateway.problem("p1").unwrap();
    assert_eq!(solved.solved_at, Some(at(12)));

    let kinds: Vec<&str> = h.drain_notifications().iter().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec!["xp_awarded", "level_up", "problem_solved", "streak_updated"]
    );
}

#[tokio::test]
async fn test_solved_problem_earns_no_xp_twice() {
    let h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(40, 1, 60));
    h.gateway.insert_problem(problem("p1", TEXT, at(8)));

    publish_completion(&h, TEXT).await;
    publish_completion(&h, TEXT).await;

    assert_eq!(h.gateway.calls(Operation::UpdateXp), 1);
    assert_eq!(h.gateway.xp(&key()).unwrap().total_xp, 48);
    assert_eq!(h.gateway.calls(Operation::UpdateProblem), 1);
    // Goals are still evaluated for the repeat.
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 2);
}

#[tokio::test]
async fn test_report_for_already_solved_problem() {
    let h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(40, 1, 60));
    let mut done = problem("p1", TEXT, at(8));
    done.solved_at = Some(at(9));
    h.gateway.insert_problem(done);

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, Some("high"), None))
        .await;

    assert_eq!(report.xp, StepOutcome::Skipped(SkipReason::AlreadySolved));
    assert_eq!(report.mark_solved, StepOutcome::Skipped(SkipReason::AlreadySolved));
    assert_eq!(report.goals, StepOutcome::Done);
    assert!(report.matched.unwrap().already_solved);
    assert_eq!(h.gateway.calls(Operation::GetXp), 0);
    assert_eq!(h.gateway.calls(Operation::UpdateXp), 0);
}

#[tokio::test]
async fn test_streak_extends_from_yesterday() {
    let h = Harness::new();
    h.gateway.insert_streak(key(), streak(5, 10, Some(days_ago(1))));

    publish_completion(&h, TEXT).await;

    let after = h.gateway.streak(&key()).unwrap();
    assert_eq!(after.current_streak, 6);
    assert_eq!(after.longest_streak, 10);
    assert_eq!(after.last_study_date, Some(today()));
}

#[tokio::test]
async fn test_streak_already_counted_today_is_not_written() {
    let h = Harness::new();
    h.gateway.insert_streak(key(), streak(5, 7, Some(today())));

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, None, None))
        .await;

    assert_eq!(
        report.streak,
        StepOutcome::Skipped(SkipReason::AlreadyCountedToday)
    );
    assert_eq!(h.gateway.calls(Operation::UpdateStreak), 0);
    assert_eq!(h.gateway.streak(&key()).unwrap().current_streak, 5);
}

#[tokio::test]
async fn test_streak_restarts_after_gap() {
    let h = Harness::new();
    h.gateway.insert_streak(key(), streak(4, 4, Some(days_ago(3))));

    publish_completion(&h, TEXT).await;

    let after = h.gateway.streak(&key()).unwrap();
    assert_eq!(after.current_streak, 1);
    assert_eq!(after.longest_streak, 4);
}

#[tokio::test]
async fn test_missing_records_skip_xp_and_create_streak() {
    let h = Harness::new();

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, Some("advanced"), None))
        .await;

    assert_eq!(report.xp, StepOutcome::Skipped(SkipReason::NoXpRecord));
    assert_eq!(report.streak, StepOutcome::Done);
    assert_eq!(
        report.mark_solved,
        StepOutcome::Skipped(SkipReason::NoMatchingProblem)
    );
    assert_eq!(h.gateway.calls(Operation::UpdateXp), 0);
    assert_eq!(h.gateway.calls(Operation::CreateStreak), 1);

    let created = h.gateway.streak(&key()).unwrap();
    assert_eq!(created.current_streak, 1);
    assert_eq!(created.longest_streak, 1);
    assert_eq!(created.last_study_date, Some(today()));
}

#[tokio::test]
async fn test_failing_steps_do_not_block_goal_check() {
    let h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(0, 1, 100));
    h.gateway.fail(Operation::GetXp);
    h.gateway.fail(Operation::GetStreak);
    h.gateway.fail(Operation::GetProblems);

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, None, None))
        .await;

    assert_eq!(report.failures(), vec![Step::Resolve, Step::Xp, Step::Streak]);
    assert_eq!(report.goals, StepOutcome::Done);
    assert_eq!(report.challenge, StepOutcome::Done);
    assert_eq!(
        report.mark_solved,
        StepOutcome::Skipped(SkipReason::ProblemUnresolved)
    );
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 1);

    let checks = h.gateway.goal_checks();
    assert_eq!(checks[0].problem_type, "fractions");
    assert_eq!(checks[0].profile_id.as_deref(), Some(PROFILE));
}

#[tokio::test]
async fn test_failed_goal_check_is_not_retried() {
    let h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(0, 1, 100));
    h.gateway.fail(Operation::CheckGoals);

    let report = publish_completion(&h, TEXT).await;

    // Step failures are contained inside the handler.
    assert_eq!(report.failures, 0);
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 1);
    assert_eq!(h.gateway.xp(&key()).unwrap().total_xp, 8);
}

#[tokio::test]
async fn test_panicking_store_does_not_block_goal_check() {
    let gateway = Arc::new(edupulse::gateway::MemoryGateway::new());
    gateway.insert_xp(key(), xp_record(0, 1, 100));
    let collaborators = Collaborators {
        store: Arc::new(PanickingProblems(gateway.clone())),
        goals: gateway.clone(),
        recommendations: gateway.clone(),
        challenges: gateway.clone(),
    };
    let h = Harness::with_collaborators(gateway, collaborators, Config::default());

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, Some("elementary"), Some(0)))
        .await;

    assert_eq!(report.resolve, StepOutcome::Failed);
    assert_eq!(report.xp, StepOutcome::Done);
    assert_eq!(report.goals, StepOutcome::Done);
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 1);
    assert_eq!(h.gateway.xp(&key()).unwrap().total_xp, 5);
}

#[tokio::test]
async fn test_prefix_match_marks_stored_problem() {
    let h = Harness::new();
    h.gateway.insert_problem(problem("p1", TEXT, at(8)));
    h.gateway.insert_problem(problem("p2", "What is 7 x 8?", at(9)));

    let retyped = format!("{} (rephrased)", &TEXT[..60]);
    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(&retyped, None, None))
        .await;

    let matched = report.matched.unwrap();
    assert_eq!(matched.problem_id, "p1");
    assert_eq!(matched.tier, "prefix");
    assert!(h.gateway.problem("p1").unwrap().is_solved());
    assert!(!h.gateway.problem("p2").unwrap().is_solved());
}

#[tokio::test]
async fn test_short_problem_restated_with_extra_text_is_the_one_solved() {
    let h = Harness::new();
    h.gateway.insert_problem(problem("short", "Solve 2x = 4", at(7)));
    h.gateway.insert_problem(problem("newer", "What is 7 x 8?", at(9)));

    let report = h
        .orchestrator
        .on_problem_completed(
            USER,
            completion("Solve 2x = 4, then check your answer", None, None),
        )
        .await;

    let matched = report.matched.unwrap();
    assert_eq!(matched.problem_id, "short");
    assert_eq!(matched.tier, "prefix");
    assert!(h.gateway.problem("short").unwrap().is_solved());
    assert!(!h.gateway.problem("newer").unwrap().is_solved());
}

#[tokio::test]
async fn test_unmatched_text_falls_back_to_newest_unsolved() {
    let h = Harness::new();
    h.gateway.insert_problem(problem("old", "What is 3 + 4?", at(7)));
    h.gateway.insert_problem(problem("new", "What is 7 x 8?", at(9)));

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion("Something else entirely", None, None))
        .await;

    let matched = report.matched.unwrap();
    assert_eq!(matched.problem_id, "new");
    assert_eq!(matched.tier, "recent_unsolved");
}

#[tokio::test]
async fn test_profile_falls_back_to_event_profile() {
    let h = Harness::new();
    h.gateway.insert_xp(key(), xp_record(0, 1, 100));

    // No profileId in the payload; the event carries it.
    publish_completion(&h, TEXT).await;

    assert_eq!(h.gateway.xp(&key()).unwrap().total_xp, 8);
    assert!(h.gateway.xp(&edupulse::ProfileKey::owner(USER)).is_none());
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let h = Harness::new();
    assert!(h.orchestrator.is_running());
    assert!(!h.orchestrator.start());
    assert!(!h.orchestrator.start());

    for event_type in EventType::ALL {
        assert_eq!(h.bus.handler_count(event_type), 1);
    }

    publish_completion(&h, TEXT).await;
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 1);
}

#[tokio::test]
async fn test_stop_then_start_registers_once() {
    let h = Harness::new();

    assert!(h.orchestrator.stop());
    assert!(!h.orchestrator.stop());
    assert_eq!(h.bus.handler_count(EventType::ProblemCompleted), 0);

    publish_completion(&h, TEXT).await;
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 0);

    assert!(h.orchestrator.start());
    assert_eq!(h.bus.handler_count(EventType::ProblemCompleted), 1);
    publish_completion(&h, TEXT).await;
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 1);
}

#[tokio::test]
async fn test_dropped_orchestrator_handles_nothing() {
    let h = Harness::new();
    let gateway = h.gateway.clone();
    let bus = h.bus.clone();
    drop(h);

    let report = bus
        .publish(
            EventType::ProblemCompleted,
            USER,
            completion_payload(TEXT),
            PublishOptions::default(),
        )
        .await;

    assert_eq!(report.failures, 0);
    assert_eq!(gateway.calls(Operation::CheckGoals), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_contained() {
    let h = Harness::new();

    let report = h
        .bus
        .publish(
            EventType::ProblemCompleted,
            USER,
            json!({ "problemType": "fractions" }),
            PublishOptions::default(),
        )
        .await;

    assert_eq!(report.handlers, 1);
    assert_eq!(report.failures, 1);
    assert_eq!(h.gateway.calls(Operation::CheckGoals), 0);
}

#[tokio::test]
async fn test_goal_completed_forwards_and_recommends() {
    let mut h = Harness::new();
    h.gateway.set_recommendations(
        ["decimals", "ratios", "percentages", "geometry"]
            .into_iter()
            .map(|subject| Recommendation {
                subject: subject.to_string(),
                reason: "Next up".to_string(),
            })
            .collect(),
    );

    h.bus
        .publish(
            EventType::GoalCompleted,
            USER,
            json!({
                "goalId": "g1",
                "goalType": "subject_mastery",
                "targetSubject": "fractions",
            }),
            PublishOptions::for_profile(Some(PROFILE.to_string())),
        )
        .await;

    assert_eq!(h.gateway.calls(Operation::Recommend), 1);

    let notifications = h.drain_notifications();
    assert_eq!(notifications.len(), 2);
    match &notifications[0] {
        ProgressNotification::Forwarded { event } => {
            assert_eq!(event.event_type, EventType::GoalCompleted);
            assert_eq!(event.actor_id, USER);
            assert_eq!(event.profile_id.as_deref(), Some(PROFILE));
            assert_eq!(event.payload["goalId"], "g1");
            assert_eq!(event.timestamp, at(12));
        }
        other => panic!("expected forwarded goal, got {other:?}"),
    }
    match &notifications[1] {
        ProgressNotification::Recommendations {
            key: k,
            recommendations,
        } => {
            assert_eq!(k, &key());
            assert_eq!(recommendations.len(), 3);
            assert_eq!(recommendations[0].subject, "decimals");
        }
        other => panic!("expected recommendations, got {other:?}"),
    }

    // Forwarding never re-enters the bus.
    assert_eq!(
        h.bus
            .history(&HistoryFilter::of_type(EventType::GoalCompleted))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_goal_completed_survives_recommendation_failure() {
    let mut h = Harness::new();
    h.gateway.fail(Operation::Recommend);

    let report = h
        .bus
        .publish(
            EventType::GoalCompleted,
            USER,
            json!({
                "goalId": "g1",
                "goalType": "daily",
                "targetSubject": "fractions",
            }),
            PublishOptions::default(),
        )
        .await;

    assert_eq!(report.failures, 0);
    let kinds: Vec<&str> = h.drain_notifications().iter().map(|n| n.kind()).collect();
    assert_eq!(kinds, vec!["forwarded"]);
}

#[tokio::test]
async fn test_achievement_is_forwarded_to_observers() {
    let mut h = Harness::new();

    h.bus
        .publish(
            EventType::AchievementUnlocked,
            USER,
            json!({ "achievementId": "a1", "achievementName": "First steps" }),
            PublishOptions::for_profile(Some(PROFILE.to_string())),
        )
        .await;

    let notifications = h.drain_notifications();
    assert_eq!(notifications.len(), 1);
    let ProgressNotification::Forwarded { event } = &notifications[0] else {
        panic!("expected forwarded achievement");
    };
    assert_eq!(event.event_type, EventType::AchievementUnlocked);
    assert_eq!(event.payload["achievementName"], "First steps");
    assert_eq!(event.payload["profileId"], PROFILE);
    assert_eq!(
        h.bus
            .history(&HistoryFilter::of_type(EventType::AchievementUnlocked))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_background_challenge_is_spawned() {
    let mut config = Config::default();
    config.orchestrator.background_challenges = true;
    let h = Harness::with_config(config);

    let report = h
        .orchestrator
        .on_problem_completed(USER, completion(TEXT, None, None))
        .await;
    assert_eq!(report.challenge, StepOutcome::Spawned);
    assert_eq!(report.goals, StepOutcome::Done);

    let gateway = h.gateway.clone();
    tokio::time::timeout(std::time::Duration::from_secs(1), async move {
        while gateway.challenges().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("challenge task did not run");

    let challenges = h.gateway.challenges();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].title, "Can you beat my fractions problem?");
}
