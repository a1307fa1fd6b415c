//! Reward calculators: XP gain, levels and streak transitions
//!
//! Everything here is pure and deterministic. This is the one place reward
//! formulas live; other surfaces should call into it instead of carrying
//! their own constants.

mod levels;
mod streaks;
mod xp;

pub use levels::{level_from_total_xp, level_threshold, xp_to_next_level, LevelCurve, LevelProgress};
pub use streaks::{advance_streak, StreakChange};
pub use xp::{xp_gain, Difficulty};
