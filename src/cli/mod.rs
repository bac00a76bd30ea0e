use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::{RankConfig, ScrapeConfig};
use crate::error::PipelineError;
use crate::models::{Division, RosterTeam};
use crate::registry;
use crate::services::matcher::TeamRegistry;
use crate::services::{connectivity, MatchScraper, ProfileCache, RankingEngine, RosterScraper};
use crate::storage::{self, DataPaths};
use crate::utils;

fn lookup_division(division_key: &str) -> Result<&'static Division> {
    match registry::get(division_key) {
        Ok(division) => Ok(division),
        Err(e) => {
            println!("❌ Unknown division: {}", division_key);
            println!("\n💡 Registered divisions:");
            for division in registry::all() {
                println!(
                    "   • {} ({}){}",
                    division.key,
                    division.display_name,
                    if division.active { "" } else { " [inactive]" }
                );
            }
            Err(e.into())
        }
    }
}

fn adjacent_roster(division: Option<&Division>) -> Option<Vec<RosterTeam>> {
    let division = division?;
    let paths = DataPaths::for_division(&division.key);
    if !paths.bronze.exists() {
        tracing::debug!("No bronze roster for adjacent division {}", division.key);
        return None;
    }
    match storage::read_bronze(&paths.bronze) {
        Ok(teams) => Some(teams),
        Err(e) => {
            tracing::warn!("Skipping adjacent roster {}: {}", division.key, e);
            None
        }
    }
}

/// Ctrl-C flips the shared flag; in-flight requests finish, no new work
/// starts.
fn cancellation_flag() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n🛑 Cancellation requested; finishing in-flight work...");
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

pub async fn scrape_teams(division_key: &str, config: ScrapeConfig) -> Result<()> {
    let division = lookup_division(division_key)?;
    let paths = DataPaths::for_division(&division.key);

    println!("📥 Scraping roster for {}...", division.display_name);
    let scraper = RosterScraper::new(config)?;
    let teams = scraper.run(division, &paths, Utc::now()).await?;

    println!("✅ {} teams written to {}", teams.len(), paths.bronze.display());
    Ok(())
}

pub async fn scrape_matches(division_key: &str, config: ScrapeConfig) -> Result<()> {
    let division = lookup_division(division_key)?;
    let paths = DataPaths::for_division(&division.key);

    let roster = storage::read_bronze(&paths.bronze)
        .with_context(|| format!("loading bronze roster {}", paths.bronze.display()))?;
    let older = adjacent_roster(registry::older(division));
    let younger = adjacent_roster(registry::younger(division));
    let team_registry = Arc::new(TeamRegistry::from_rosters(
        &roster,
        older.as_deref(),
        younger.as_deref(),
    ));

    println!(
        "📥 Scraping match histories for {} ({} roster teams)...",
        division.display_name,
        roster.len()
    );
    let cache = Arc::new(ProfileCache::load(paths.cache.clone()));
    let scraper = MatchScraper::new(config)?;
    let cancel = cancellation_flag();

    match scraper
        .run(division, &roster, team_registry, cache, &paths, cancel)
        .await
    {
        Ok((rows, summary)) => {
            println!(
                "✅ {} gold rows written to {} ({} attempted, {} succeeded, {} zero-match, {} failed)",
                rows.len(),
                paths.gold.display(),
                summary.attempted,
                summary.succeeded,
                summary.zero_match,
                summary.failed
            );
            Ok(())
        }
        Err(e @ PipelineError::ThresholdExceeded { .. }) => {
            println!("❌ {}", e);
            println!("📄 Partial output preserved; see {}", paths.error_log.display());
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn rank_division(division_key: &str, config: RankConfig) -> Result<()> {
    let division = lookup_division(division_key)?;
    let paths = DataPaths::for_division(&division.key);

    let matches = storage::read_gold(&paths.gold)
        .with_context(|| format!("loading gold matches {}", paths.gold.display()))?;
    let roster = storage::read_bronze(&paths.bronze)
        .with_context(|| format!("loading bronze roster {}", paths.bronze.display()))?;
    let older = adjacent_roster(registry::older(division));
    let younger = adjacent_roster(registry::younger(division));

    println!(
        "📊 Ranking {} ({} gold rows, {} roster teams)...",
        division.display_name,
        matches.len(),
        roster.len()
    );
    let engine = RankingEngine::new(config);
    let outcome = engine.rank(
        &matches,
        &roster,
        older.as_deref(),
        younger.as_deref(),
        Utc::now().date_naive(),
    )?;

    storage::write_rankings(&paths.rankings, &outcome.rows)?;
    let connectivity_rows = connectivity::report(&roster, &matches);
    storage::write_connectivity(&paths.connectivity, &connectivity_rows)?;

    let summary = &outcome.summary;
    println!(
        "✅ {} teams ranked ({} active, {} provisional, {} inactive)",
        summary.ranked_teams, summary.active, summary.provisional, summary.inactive
    );
    println!(
        "   Solver: {} iteration{}, {}; window {} → {}",
        summary.iterations,
        if summary.iterations == 1 { "" } else { "s" },
        if summary.converged { "converged" } else { "hit the iteration cap" },
        summary.window_start,
        summary.window_end
    );
    println!("   Rankings: {}", paths.rankings.display());
    println!("   Connectivity: {}", paths.connectivity.display());

    if !outcome.rows.is_empty() {
        println!("\n🏆 Top teams:");
        for row in outcome.rows.iter().take(5) {
            println!(
                "{:>4}. {} ({}) | {:.4} adj, {} games, {:.0}% win",
                row.rank,
                row.team_name,
                utils::format_record(row.wins, row.losses, row.ties),
                row.power_score_adj,
                row.games_played,
                utils::win_percentage(row.wins, row.losses, row.ties)
            );
        }
    }
    Ok(())
}

/// Roster → matches → rankings for one division, stopping on the first fatal
/// error so the exit code reflects the failing stage.
pub async fn run_all(
    division_key: &str,
    scrape_config: ScrapeConfig,
    rank_config: RankConfig,
) -> Result<()> {
    scrape_teams(division_key, scrape_config.clone()).await?;
    scrape_matches(division_key, scrape_config).await?;
    rank_division(division_key, rank_config)
}
