//! XP and Level system
//!
//! Level 1 spans `[0, base)`. Every later level starts `base × growth` XP after
//! the previous one, rounded to whole XP: with the defaults that is
//! 0, 100, 250, 400, 550, ...

use crate::config::RewardSettings;

/// The level curve, derived from [`RewardSettings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCurve {
    pub base_xp: u32,
    pub growth: f64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::from(&RewardSettings::default())
    }
}

impl From<&RewardSettings> for LevelCurve {
    fn from(settings: &RewardSettings) -> Self {
        Self {
            base_xp: settings.level_base_xp,
            growth: settings.level_growth,
        }
    }
}

impl LevelCurve {
    /// Total XP at which `level` begins
    pub fn threshold(&self, level: u32) -> u32 {
        if level <= 1 {
            return 0;
        }
        let base = f64::from(self.base_xp);
        let raw = (base * f64::from(level - 2) * self.growth + base).round();
        if raw >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            raw.max(0.0) as u32
        }
    }

    /// Greatest level whose threshold is at or below `total_xp`
    pub fn level_for(&self, total_xp: u32) -> u32 {
        if total_xp < self.base_xp {
            return 1;
        }

        let step = f64::from(self.base_xp) * self.growth;
        if step < 1.0 {
            // Degenerate curve: every level past 1 starts at `base_xp`.
            return 2;
        }

        let estimate = 2.0 + (f64::from(total_xp - self.base_xp) / step).floor();
        let mut level = if estimate >= f64::from(u32::MAX) {
            u32::MAX - 1
        } else {
            estimate as u32
        };

        // Correct for rounding in `threshold`.
        while level > 1 && self.threshold(level) > total_xp {
            level -= 1;
        }
        while let Some(next) = level.checked_add(1) {
            let next_threshold = self.threshold(next);
            if next_threshold > total_xp || next_threshold == self.threshold(level) {
                break;
            }
            level = next;
        }
        level
    }

    /// XP still missing to reach `level + 1`, floored at 0
    pub fn xp_to_next(&self, total_xp: u32, level: u32) -> u32 {
        self.threshold(level.saturating_add(1))
            .saturating_sub(total_xp)
    }

    pub fn progress(&self, total_xp: u32) -> LevelProgress {
        let level = self.level_for(total_xp);
        LevelProgress {
            total_xp,
            level,
            xp_to_next_level: self.xp_to_next(total_xp, level),
        }
    }
}

/// Level state derived from a total
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub level: u32,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: u32,
}

/// XP at which `level` begins, using the reference curve
pub fn level_threshold(level: u32) -> u32 {
    LevelCurve::default().threshold(level)
}

/// Level for a total, using the reference curve
pub fn level_from_total_xp(total_xp: u32) -> u32 {
    LevelCurve::default().level_for(total_xp)
}

/// XP to the next level, using the reference curve
pub fn xp_to_next_level(total_xp: u32, level: u32) -> u32 {
    LevelCurve::default().xp_to_next(total_xp, level)
}
