use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use edupulse::config::Config;

mod cli;

#[derive(Parser)]
#[command(name = "edupulse")]
#[command(about = "EduPulse - XP, streaks and goals for learners")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.edupulse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a fixture of events through the orchestrator and print the result
    Simulate {
        /// JSON fixture with the initial state and the events to publish
        fixture: PathBuf,

        /// Pin the calendar day (YYYY-MM-DD) instead of using the system clock
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Show the level and XP to the next level for a total
    Level {
        /// Total XP earned
        total_xp: u32,
    },

    /// Show the XP earned for one solved problem
    Xp {
        /// elementary, middle, high or advanced
        #[arg(short, long)]
        difficulty: Option<String>,

        /// Number of hints used
        #[arg(long, default_value_t = 0)]
        hints: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { fixture, today } => {
            cli::simulate::simulate_command(&config, &fixture, today).await?;
        }
        Commands::Level { total_xp } => {
            cli::rewards::level_command(&config, total_xp)?;
        }
        Commands::Xp { difficulty, hints } => {
            cli::rewards::xp_command(&config, difficulty.as_deref(), hints)?;
        }
    }

    Ok(())
}
