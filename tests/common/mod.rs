//! Shared fixtures for orchestrator and bus integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::broadcast;

use edupulse::bus::EventBus;
use edupulse::clock::FixedClock;
use edupulse::config::Config;
use edupulse::gateway::{Collaborators, GatewayResult, MemoryGateway, ProgressStore};
use edupulse::notify::ProgressNotification;
use edupulse::orchestrator::Orchestrator;
use edupulse::{ProblemCompleted, ProblemPatch, ProblemRecord, ProfileKey, StreakRecord, XpRecord};

pub const USER: &str = "parent-1";
pub const PROFILE: &str = "kid-ada";

/// The day every harness clock is pinned to
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date")
}

pub fn days_ago(n: i64) -> NaiveDate {
    today() - Duration::days(n)
}

pub fn key() -> ProfileKey {
    ProfileKey::new(USER, Some(PROFILE.to_string()))
}

pub fn at(hour: u32) -> DateTime<Utc> {
    today()
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
        .and_utc()
}

pub fn problem(id: &str, text: &str, created_at: DateTime<Utc>) -> ProblemRecord {
    ProblemRecord {
        id: id.to_string(),
        text: text.to_string(),
        problem_type: "fractions".to_string(),
        solved_at: None,
        created_at,
        user_id: USER.to_string(),
        profile_id: Some(PROFILE.to_string()),
    }
}

pub fn completion(text: &str, difficulty: Option<&str>, hints: Option<u32>) -> ProblemCompleted {
    ProblemCompleted {
        problem_text: text.to_string(),
        problem_type: "fractions".to_string(),
        difficulty: difficulty.map(str::to_string),
        hints_used: hints,
        profile_id: Some(PROFILE.to_string()),
    }
}

pub fn xp_record(total_xp: u32, level: u32, xp_to_next_level: u32) -> XpRecord {
    XpRecord {
        total_xp,
        level,
        xp_to_next_level,
        ..XpRecord::default()
    }
}

pub fn streak(current: u32, longest: u32, last: Option<NaiveDate>) -> StreakRecord {
    StreakRecord {
        current_streak: current,
        longest_streak: longest,
        last_study_date: last,
    }
}

/// A started orchestrator wired to a fresh bus and an in-memory gateway
pub struct Harness {
    pub gateway: Arc<MemoryGateway>,
    pub bus: EventBus,
    pub orchestrator: Arc<Orchestrator>,
    pub notifications: broadcast::Receiver<ProgressNotification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        Self::with_collaborators(
            gateway.clone(),
            Collaborators::from_shared(gateway),
            config,
        )
    }

    pub fn with_collaborators(
        gateway: Arc<MemoryGateway>,
        collaborators: Collaborators,
        config: Config,
    ) -> Self {
        let bus = EventBus::from_settings(&config.bus);
        let orchestrator = Arc::new(
            Orchestrator::new(bus.clone(), collaborators, &config)
                .with_clock(Arc::new(FixedClock::new(at(12)))),
        );
        let notifications = orchestrator.notifier().subscribe();
        orchestrator.start();
        Self {
            gateway,
            bus,
            orchestrator,
            notifications,
        }
    }

    /// Notifications emitted so far
    pub fn drain_notifications(&mut self) -> Vec<ProgressNotification> {
        let mut out = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            out.push(notification);
        }
        out
    }
}

/// Progress store whose problem lookup panics; everything else goes to the
/// wrapped gateway.
pub struct PanickingProblems(pub Arc<MemoryGateway>);

#[async_trait]
impl ProgressStore for PanickingProblems {
    async fn get_xp_data(&self, key: &ProfileKey) -> GatewayResult<Option<XpRecord>> {
        self.0.get_xp_data(key).await
    }

    async fn update_xp_data(&self, key: &ProfileKey, record: &XpRecord) -> GatewayResult<()> {
        self.0.update_xp_data(key, record).await
    }

    async fn get_streak_data(&self, key: &ProfileKey) -> GatewayResult<Option<StreakRecord>> {
        self.0.get_streak_data(key).await
    }

    async fn update_streak_data(
        &self,
        key: &ProfileKey,
        record: &StreakRecord,
    ) -> GatewayResult<()> {
        self.0.update_streak_data(key, record).await
    }

    async fn create_default_streak_data(&self, key: &ProfileKey) -> GatewayResult<StreakRecord> {
        self.0.create_default_streak_data(key).await
    }

    async fn get_problems(&self, _key: &ProfileKey) -> GatewayResult<Vec<ProblemRecord>> {
        panic!("problem index corrupted");
    }

    async fn update_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        patch: &ProblemPatch,
    ) -> GatewayResult<()> {
        self.0.update_problem(user_id, problem_id, patch).await
    }
}
