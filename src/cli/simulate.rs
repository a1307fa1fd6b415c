//! Simulate command implementation
//!
//! Replays a JSON fixture through a real bus and orchestrator backed by the
//! in-memory gateway:
//!
//! ```json
//! {
//!   "state": { "profiles": [...], "problems": [...], "recommendations": [...] },
//!   "events": [
//!     { "type": "problem_completed", "actorId": "u1", "payload": { ... } }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

use edupulse::bus::{EventBus, HistoryFilter, PublishOptions};
use edupulse::clock::{Clock, FixedClock, SystemClock};
use edupulse::config::Config;
use edupulse::gateway::{Collaborators, MemoryGateway, Snapshot};
use edupulse::notify::ProgressNotification;
use edupulse::orchestrator::Orchestrator;
use edupulse::{DomainEvent, EventType};

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    state: Snapshot,
    #[serde(default)]
    events: Vec<FixtureEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureEvent {
    #[serde(rename = "type")]
    event_type: EventType,
    actor_id: String,
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationOutput {
    state: Snapshot,
    notifications: Vec<ProgressNotification>,
    history: Vec<DomainEvent>,
    handler_failures: usize,
}

/// Run every fixture event through the orchestrator and print the outcome
pub async fn simulate_command(
    config: &Config,
    fixture_path: &Path,
    today: Option<NaiveDate>,
) -> Result<()> {
    let content = std::fs::read_to_string(fixture_path)
        .with_context(|| format!("Failed to read fixture: {}", fixture_path.display()))?;
    let fixture: Fixture = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixture: {}", fixture_path.display()))?;

    let clock: Arc<dyn Clock> = match today {
        Some(day) => Arc::new(FixedClock::on(day)),
        None => Arc::new(SystemClock),
    };

    let output = replay(config, fixture, clock).await;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn replay(config: &Config, fixture: Fixture, clock: Arc<dyn Clock>) -> SimulationOutput {

    let gateway = Arc::new(MemoryGateway::from_snapshot(fixture.state));
    let bus = EventBus::from_settings(&config.bus);
    let orchestrator = Arc::new(
        Orchestrator::new(bus.clone(), Collaborators::from_shared(gateway.clone()), config)
            .with_clock(clock),
    );
    let mut notifications = orchestrator.notifier().subscribe();
    orchestrator.start();

    info!(events = fixture.events.len(), "Replaying fixture");
    let mut handler_failures = 0;
    for event in fixture.events {
        let report = bus
            .publish(
                event.event_type,
                event.actor_id,
                event.payload,
                PublishOptions::for_profile(event.profile_id),
            )
            .await;
        handler_failures += report.failures;
    }

    orchestrator.stop();

    let mut received = Vec::new();
    loop {
        match notifications.try_recv() {
            Ok(notification) => received.push(notification),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification buffer overflowed");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    SimulationOutput {
        state: gateway.snapshot(),
        notifications: received,
        history: bus.history(&HistoryFilter::default()),
        handler_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../demos/simulate.json");

    fn demo() -> Fixture {
        serde_json::from_str(DEMO).unwrap()
    }

    #[test]
    fn test_demo_fixture_parses() {
        let fixture = demo();
        assert_eq!(fixture.state.profiles.len(), 1);
        assert_eq!(fixture.state.problems.len(), 2);
        assert_eq!(fixture.state.recommendations.len(), 4);

        let types: Vec<EventType> = fixture.events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::ProblemCompleted,
                EventType::ProblemCompleted,
                EventType::AchievementUnlocked,
                EventType::GoalCompleted,
            ]
        );
        assert!(fixture.events.iter().all(|e| e.profile_id.as_deref() == Some("kid-ada")));
    }

    #[test]
    fn test_fixture_sections_are_optional() {
        let fixture: Fixture = serde_json::from_str("{}").unwrap();
        assert!(fixture.events.is_empty());
        assert_eq!(fixture.state, Snapshot::default());
    }

    #[tokio::test]
    async fn test_demo_replay() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let output = replay(&Config::default(), demo(), Arc::new(FixedClock::on(today))).await;

        assert_eq!(output.handler_failures, 0);
        assert_eq!(output.history.len(), 4);

        let profile = &output.state.profiles[0];
        // One award only: the second completion hits the already-solved problem.
        let xp = profile.xp.as_ref().unwrap();
        assert_eq!(xp.total_xp, 103);
        assert_eq!(xp.level, 2);
        let streak = profile.streak.as_ref().unwrap();
        assert_eq!(streak.current_streak, 4);
        assert_eq!(streak.longest_streak, 4);
        assert_eq!(streak.last_study_date, Some(today));

        let solved: Vec<&str> = output
            .state
            .problems
            .iter()
            .filter(|p| p.is_solved())
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(solved, vec!["prob-1"]);

        let kinds: Vec<&str> = output.notifications.iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "xp_awarded",
                "level_up",
                "problem_solved",
                "streak_updated",
                "streak_updated",
                "forwarded",
                "forwarded",
                "recommendations",
            ]
        );
    }
}
