//! Reward calculator commands

use anyhow::{bail, Result};

use edupulse::config::Config;
use edupulse::rewards::{xp_gain, Difficulty, LevelCurve};

/// Print the level reached with `total_xp`
pub fn level_command(config: &Config, total_xp: u32) -> Result<()> {
    let progress = LevelCurve::from(&config.rewards).progress(total_xp);

    println!("Total XP:         {}", progress.total_xp);
    println!("Level:            {}", progress.level);
    println!("XP to next level: {}", progress.xp_to_next_level);

    Ok(())
}

/// Print the XP one solved problem is worth
pub fn xp_command(config: &Config, difficulty: Option<&str>, hints: u32) -> Result<()> {
    let difficulty = match difficulty {
        Some(label) => match Difficulty::parse(label) {
            Some(d) => d,
            None => bail!(
                "Unknown difficulty: {} (expected elementary, middle, high or advanced)",
                label
            ),
        },
        None => config.rewards.default_difficulty,
    };

    let amount = xp_gain(difficulty, hints, &config.rewards);
    println!("{} problem, {} hint(s): {} XP", difficulty, hints, amount);

    Ok(())
}
