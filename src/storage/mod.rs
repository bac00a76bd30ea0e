use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{PipelineError, Result};
use crate::models::{
    AgeContext, ConnectivityRow, ErrorLogEntry, MatchRow, RankingRow, RosterTeam,
};

/// All file locations for one division. Layout follows the bronze/gold tiers:
/// raw scrapes land in `bronze/`, the cleaned match table in `gold/`, engine
/// outputs in `outputs/`. `CACHE_DIR` overrides the profile-cache directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub bronze: PathBuf,
    pub gold: PathBuf,
    pub cache: PathBuf,
    pub error_log: PathBuf,
    pub event_log: PathBuf,
    pub rankings: PathBuf,
    pub connectivity: PathBuf,
}

impl DataPaths {
    pub fn for_division(division_key: &str) -> Self {
        let cache_dir = env::var("CACHE_DIR").unwrap_or_else(|_| "cache".to_string());
        Self {
            bronze: PathBuf::from(format!("bronze/{}_teams.csv", division_key)),
            gold: PathBuf::from(format!("gold/matches_{}.csv", division_key)),
            cache: Path::new(&cache_dir).join(format!("profiles_{}.json", division_key)),
            error_log: PathBuf::from(format!("logs/scrape_errors_{}.log", division_key)),
            event_log: PathBuf::from(format!("logs/scrape_events_{}.log", division_key)),
            rankings: PathBuf::from(format!("outputs/rankings_{}.csv", division_key)),
            connectivity: PathBuf::from(format!("outputs/connectivity_{}.csv", division_key)),
        }
    }
}

/// Write-temp-then-rename so readers never observe a half-written artifact.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn malformed(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::MalformedInput {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

// ── Bronze roster ─────────────────────────────────────────────────────────────

pub fn write_bronze(path: &Path, teams: &[RosterTeam]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["team_name", "team_key", "external_id", "club", "state", "scraped_at"])?;
    for team in teams {
        let scraped_at = team.scraped_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        writer.write_record([
            team.team_name.as_str(),
            team.team_key.as_str(),
            team.external_id.as_deref().unwrap_or(""),
            team.club.as_deref().unwrap_or(""),
            team.state.as_deref().unwrap_or(""),
            scraped_at.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| malformed(path, e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn read_bronze(path: &Path) -> Result<Vec<RosterTeam>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| malformed(path, format!("cannot open: {}", e)))?;
    let mut teams = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(path, e.to_string()))?;
        if record.len() < 6 {
            return Err(malformed(path, format!("expected 6 columns, got {}", record.len())));
        }
        let scraped_at = DateTime::parse_from_rfc3339(&record[5])
            .map_err(|e| malformed(path, format!("bad scraped_at '{}': {}", &record[5], e)))?
            .with_timezone(&Utc);
        let optional = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        teams.push(RosterTeam {
            team_name: record[0].to_string(),
            team_key: record[1].to_string(),
            external_id: optional(&record[2]),
            club: optional(&record[3]),
            state: optional(&record[4]),
            scraped_at,
        });
    }
    Ok(teams)
}

// ── Gold matches ──────────────────────────────────────────────────────────────

pub fn write_gold(path: &Path, matches: &[MatchRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "date",
        "team_a_key",
        "team_a_name",
        "team_b_key",
        "team_b_name",
        "score_a",
        "score_b",
        "competition",
        "source_url",
        "age_context",
        "match_confidence",
    ])?;
    for row in matches {
        let date = row.date.format("%Y-%m-%d").to_string();
        let score_a = row.score_a.to_string();
        let score_b = row.score_b.to_string();
        writer.write_record([
            date.as_str(),
            row.team_a_key.as_str(),
            row.team_a_name.as_str(),
            row.team_b_key.as_str(),
            row.team_b_name.as_str(),
            score_a.as_str(),
            score_b.as_str(),
            row.competition.as_str(),
            row.source_url.as_str(),
            row.age_context.as_str(),
            row.match_confidence.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| malformed(path, e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn read_gold(path: &Path) -> Result<Vec<MatchRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| malformed(path, format!("cannot open: {}", e)))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(path, e.to_string()))?;
        if record.len() < 11 {
            return Err(malformed(path, format!("expected 11 columns, got {}", record.len())));
        }
        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d")
            .map_err(|e| malformed(path, format!("bad date '{}': {}", &record[0], e)))?;
        let score_a: u32 = record[5]
            .parse()
            .map_err(|_| malformed(path, format!("non-numeric score_a '{}'", &record[5])))?;
        let score_b: u32 = record[6]
            .parse()
            .map_err(|_| malformed(path, format!("non-numeric score_b '{}'", &record[6])))?;
        rows.push(MatchRow {
            date,
            team_a_key: record[1].to_string(),
            team_a_name: record[2].to_string(),
            team_b_key: record[3].to_string(),
            team_b_name: record[4].to_string(),
            score_a,
            score_b,
            competition: record[7].to_string(),
            source_url: record[8].to_string(),
            age_context: AgeContext::parse(&record[9]),
            match_confidence: record[10].to_string(),
        });
    }
    Ok(rows)
}

// ── Engine outputs ────────────────────────────────────────────────────────────

pub fn write_rankings(path: &Path, rows: &[RankingRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "rank",
        "team_key",
        "team_name",
        "state",
        "status",
        "games_played",
        "wins",
        "losses",
        "ties",
        "goals_for",
        "goals_against",
        "offense_raw",
        "defense_raw",
        "sos_raw",
        "offense_norm",
        "defense_norm",
        "sos_norm",
        "power_score",
        "games_penalty",
        "power_score_adj",
        "last_game_date",
        "cross_age_games",
        "cross_age_pct",
        "cross_state_games",
        "cross_state_pct",
    ])?;
    for row in rows {
        writer.write_record([
            row.rank.to_string(),
            row.team_key.clone(),
            row.team_name.clone(),
            row.state.clone(),
            row.status.as_str().to_string(),
            row.games_played.to_string(),
            row.wins.to_string(),
            row.losses.to_string(),
            row.ties.to_string(),
            row.goals_for.to_string(),
            row.goals_against.to_string(),
            format!("{:.4}", row.offense_raw),
            format!("{:.4}", row.defense_raw),
            format!("{:.4}", row.sos_raw),
            format!("{:.4}", row.offense_norm),
            format!("{:.4}", row.defense_norm),
            format!("{:.4}", row.sos_norm),
            format!("{:.4}", row.power_score),
            format!("{:.4}", row.games_penalty),
            format!("{:.4}", row.power_score_adj),
            row.last_game_date.format("%Y-%m-%d").to_string(),
            row.cross_age_games.to_string(),
            format!("{:.1}", row.cross_age_pct),
            row.cross_state_games.to_string(),
            format!("{:.1}", row.cross_state_pct),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| malformed(path, e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn write_connectivity(path: &Path, rows: &[ConnectivityRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["team_key", "component_id", "component_size", "degree"])?;
    for row in rows {
        writer.write_record([
            row.team_key.clone(),
            row.component_id.to_string(),
            row.component_size.to_string(),
            row.degree.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| malformed(path, e.to_string()))?;
    write_atomic(path, &bytes)
}

// ── Append-only logs ──────────────────────────────────────────────────────────

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// One JSON object per line, matching the §6 error-log contract.
pub fn append_error(path: &Path, entry: &ErrorLogEntry) -> Result<()> {
    append_line(path, &serde_json::to_string(entry)?)
}

/// Scrape lifecycle events (stage started/finished, summaries) share the
/// JSONL transport of the error log.
pub fn append_event(path: &Path, event: &serde_json::Value) -> Result<()> {
    append_line(path, &serde_json::to_string(event)?)
}
