mod cli;
mod config;
mod error;
mod models;
mod registry;
mod services;
mod storage;
mod utils;

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{RankConfig, ScrapeConfig};
use crate::error::PipelineError;

#[derive(Parser)]
#[command(name = "pitchrank")]
#[command(about = "Schedule-aware power rankings for youth soccer divisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the division roster (stage 1, bronze)
    ScrapeTeams {
        #[arg(long)]
        division: String,
        /// Treat an empty upstream roster as a warning instead of an error
        #[arg(long)]
        allow_empty: bool,
    },
    /// Scrape per-team match histories (stage 2, gold)
    ScrapeMatches {
        #[arg(long)]
        division: String,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },
    /// Compute rankings and the connectivity report from the gold table
    Rank {
        #[arg(long)]
        division: String,
        #[arg(long)]
        window_days: Option<i64>,
    },
    /// Roster, matches, then rankings in one run
    All {
        #[arg(long)]
        division: String,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        timeout_seconds: Option<u64>,
        #[arg(long)]
        window_days: Option<i64>,
        #[arg(long)]
        allow_empty: bool,
    },
}

fn scrape_config(
    workers: Option<usize>,
    timeout_seconds: Option<u64>,
    allow_empty: bool,
) -> ScrapeConfig {
    let mut config = ScrapeConfig::from_env();
    if let Some(workers) = workers {
        config.workers = workers.max(1);
    }
    if let Some(secs) = timeout_seconds {
        config.timeout = Duration::from_secs(secs);
    }
    config.allow_empty = allow_empty;
    config
}

fn rank_config(window_days: Option<i64>) -> RankConfig {
    let mut config = RankConfig::default();
    if let Some(days) = window_days {
        config.window_days = days.max(1);
    }
    config
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let result: anyhow::Result<()> = match cli.command {
        Commands::ScrapeTeams { division, allow_empty } => {
            tracing::info!("Scraping roster for division: {}", division);
            cli::scrape_teams(&division, scrape_config(None, None, allow_empty)).await
        }
        Commands::ScrapeMatches {
            division,
            workers,
            timeout_seconds,
        } => {
            tracing::info!("Scraping match histories for division: {}", division);
            cli::scrape_matches(&division, scrape_config(workers, timeout_seconds, false)).await
        }
        Commands::Rank { division, window_days } => {
            tracing::info!("Ranking division: {}", division);
            cli::rank_division(&division, rank_config(window_days))
        }
        Commands::All {
            division,
            workers,
            timeout_seconds,
            window_days,
            allow_empty,
        } => {
            tracing::info!("Full pipeline for division: {}", division);
            cli::run_all(
                &division,
                scrape_config(workers, timeout_seconds, allow_empty),
                rank_config(window_days),
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        let code = e
            .downcast_ref::<PipelineError>()
            .map(PipelineError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
