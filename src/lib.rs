//! EduPulse - learning progress engine
//!
//! EduPulse turns learning events into rewards. When a learner finishes a
//! problem, the completion orchestrator awards XP, advances the daily streak,
//! re-evaluates goals, spawns a social challenge and marks the stored problem
//! solved, then tells UI observers what changed.
//!
//! ## Pieces
//!
//! 1. **Event bus** ([`bus`]): in-process publish/subscribe with bounded
//!    history. A failing handler never affects the publisher or its siblings.
//!
//! 2. **Orchestrator** ([`orchestrator`]): subscribes to the bus and fans each
//!    event out to the collaborators behind the [`gateway`] traits.
//!
//! 3. **Reward calculators** ([`rewards`]): pure XP, level and streak math.

pub mod bus;
pub mod clock;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod matcher;
pub mod notify;
pub mod orchestrator;
pub mod rewards;

pub use domain::*;
