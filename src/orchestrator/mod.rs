//! Completion orchestrator
//!
//! Reacts to `problem_completed`, `achievement_unlocked` and `goal_completed`
//! events and fans each one out into XP, streak, goal, challenge and
//! recommendation updates.
//!
//! # Architecture
//!
//! ```text
//!   publisher ──► EventBus ──► Orchestrator ──► ProgressStore (XP, streak, problems)
//!                                  │        ├─► GoalChecker
//!                                  │        ├─► ChallengeGenerator
//!                                  │        └─► RecommendationEngine
//!                                  └──► Notifier ──► UI observers
//! ```
//!
//! The application root builds one orchestrator, wraps it in an `Arc` and
//! calls [`Orchestrator::start`]. Starting twice is a no-op.
//!
//! Every step runs even if an earlier one failed. Failures are logged with
//! the user, profile and step; nothing is retried. Reads and writes of XP and
//! streak records are not serialized per profile, so two completions for the
//! same profile racing each other can lose an update.

mod completion;
mod report;

pub use report::{CompletionReport, MatchedProblem, SkipReason, Step, StepOutcome};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, OrchestratorSettings, RewardSettings};
use crate::domain::{
    AchievementUnlocked, DomainEvent, EventType, GoalCompleted, ProblemCompleted, ProfileKey,
};
use crate::gateway::Collaborators;
use crate::matcher::ProblemMatcher;
use crate::notify::{Notifier, ProgressNotification};
use crate::rewards::LevelCurve;

pub struct Orchestrator {
    bus: EventBus,
    collaborators: Collaborators,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    matcher: ProblemMatcher,
    rewards: RewardSettings,
    curve: LevelCurve,
    settings: OrchestratorSettings,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Orchestrator {
    pub fn new(bus: EventBus, collaborators: Collaborators, config: &Config) -> Self {
        Self {
            bus,
            collaborators,
            notifier: Notifier::with_capacity(config.orchestrator.notification_capacity),
            clock: Arc::new(SystemClock),
            matcher: ProblemMatcher::new(&config.matcher),
            rewards: config.rewards.clone(),
            curve: LevelCurve::from(&config.rewards),
            settings: config.orchestrator.clone(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observer channel for UI notifications
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn is_running(&self) -> bool {
        !self.subscriptions().is_empty()
    }

    /// Register the three event handlers on the bus.
    ///
    /// Returns false (and registers nothing) if already started.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut subscriptions = self.subscriptions();
        if !subscriptions.is_empty() {
            debug!("Orchestrator already started");
            return false;
        }

        subscriptions.push(self.route(EventType::ProblemCompleted, |o, event| async move {
            o.handle_problem_completed(event).await
        }));
        subscriptions.push(self.route(EventType::AchievementUnlocked, |o, event| async move {
            o.handle_achievement_unlocked(event)
        }));
        subscriptions.push(self.route(EventType::GoalCompleted, |o, event| async move {
            o.handle_goal_completed(event).await
        }));

        info!("Orchestrator started");
        true
    }

    /// Remove the event handlers. Returns false if not running.
    pub fn stop(&self) -> bool {
        let drained: Vec<Subscription> = self.subscriptions().drain(..).collect();
        if drained.is_empty() {
            return false;
        }
        for subscription in drained {
            subscription.unsubscribe();
        }
        info!("Orchestrator stopped");
        true
    }

    /// Re-publish an achievement as a canonical event.
    ///
    /// The event goes to observers as [`ProgressNotification::Forwarded`], not
    /// back onto the bus: this handler is subscribed to `achievement_unlocked`
    /// itself, so publishing there would re-enter it without end. The bus
    /// history keeps only the original event.
    pub fn on_achievement_unlocked(&self, user_id: &str, payload: &AchievementUnlocked) {
        let event = self.canonical_event(
            EventType::AchievementUnlocked,
            user_id,
            payload.profile_id.clone(),
            payload,
        );
        debug!(
            user_id,
            achievement_id = %payload.achievement_id,
            "Forwarding achievement"
        );
        self.notifier.notify(ProgressNotification::Forwarded { event });
    }

    /// Re-publish a completed goal and ask what to study next.
    ///
    /// As with [`on_achievement_unlocked`](Self::on_achievement_unlocked), the
    /// canonical event goes to observers as
    /// [`ProgressNotification::Forwarded`] rather than onto the bus, which
    /// would route it back here. Recommendations follow as a
    /// [`ProgressNotification::Recommendations`].
    pub async fn on_goal_completed(&self, user_id: &str, payload: &GoalCompleted) {
        let key = ProfileKey::new(user_id, payload.profile_id.clone());
        let event = self.canonical_event(
            EventType::GoalCompleted,
            user_id,
            payload.profile_id.clone(),
            payload,
        );
        debug!(user_id, goal_id = %payload.goal_id, "Forwarding completed goal");
        self.notifier.notify(ProgressNotification::Forwarded { event });

        let recommendations = self
            .guard(&key, Step::Recommendations, async {
                self.collaborators
                    .recommendations
                    .get_subject_recommendations(
                        user_id,
                        key.profile_id(),
                        self.settings.recommendation_count,
                    )
                    .await
            })
            .await;

        if let Some(recommendations) = recommendations {
            debug!(user_id, count = recommendations.len(), "Received recommendations");
            self.notifier.notify(ProgressNotification::Recommendations {
                key,
                recommendations,
            });
        }
    }

    fn subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .expect("orchestrator subscription lock poisoned")
    }

    /// Subscribe a handler that holds the orchestrator weakly, so the bus does
    /// not keep it alive.
    fn route<H, Fut>(self: &Arc<Self>, event_type: EventType, handle: H) -> Subscription
    where
        H: Fn(Arc<Self>, DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        self.bus.subscribe(event_type, move |event| {
            let pending = weak.upgrade().map(|o| handle(o, event));
            async move {
                match pending {
                    Some(fut) => fut.await,
                    None => Ok(()),
                }
            }
        })
    }

    async fn handle_problem_completed(&self, event: DomainEvent) -> anyhow::Result<()> {
        let mut payload: ProblemCompleted = event.payload_as()?;
        if payload.profile_id.is_none() {
            payload.profile_id = event.profile_id.clone();
        }
        let report = self.on_problem_completed(&event.actor_id, payload).await;
        debug!(event_id = %event.id, ?report, "Completion processed");
        Ok(())
    }

    fn handle_achievement_unlocked(&self, event: DomainEvent) -> anyhow::Result<()> {
        let mut payload: AchievementUnlocked = event.payload_as()?;
        if payload.profile_id.is_none() {
            payload.profile_id = event.profile_id.clone();
        }
        self.on_achievement_unlocked(&event.actor_id, &payload);
        Ok(())
    }

    async fn handle_goal_completed(&self, event: DomainEvent) -> anyhow::Result<()> {
        let mut payload: GoalCompleted = event.payload_as()?;
        if payload.profile_id.is_none() {
            payload.profile_id = event.profile_id.clone();
        }
        self.on_goal_completed(&event.actor_id, &payload).await;
        Ok(())
    }

    fn canonical_event<T: serde::Serialize>(
        &self,
        event_type: EventType,
        user_id: &str,
        profile_id: Option<String>,
        payload: &T,
    ) -> DomainEvent {
        let payload = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        let mut event = DomainEvent::new(event_type, user_id, payload).for_profile(profile_id);
        event.timestamp = self.clock.now();
        event
    }

    /// Run one step, turning errors and panics into a log line and `None`
    async fn guard<T>(
        &self,
        key: &ProfileKey,
        step: Step,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(
                    user_id = %key.user_id,
                    profile_id = ?key.profile_id,
                    step = step.as_str(),
                    error = %format!("{e:#}"),
                    "Completion step failed"
                );
                None
            }
            Err(_) => {
                error!(
                    user_id = %key.user_id,
                    profile_id = ?key.profile_id,
                    step = step.as_str(),
                    "Completion step panicked"
                );
                None
            }
        }
    }
}
