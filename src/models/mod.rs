use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A ranking scope: one (state, gender, age group) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Division {
    pub key: String,
    pub display_name: String,
    pub age: u8,
    pub gender: Gender,
    pub state: String,
    pub roster_url: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "m",
            Gender::Female => "f",
        }
    }
}

/// One roster row as extracted by Stage 1 (bronze tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterTeam {
    pub team_name: String,
    pub team_key: String,
    pub external_id: Option<String>,
    pub club: Option<String>,
    pub state: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// One cleaned, deduplicated match row (gold tier).
///
/// `team_a_key <= team_b_key` always holds; `(date, team_a_key, team_b_key)`
/// is the primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRow {
    pub date: NaiveDate,
    pub team_a_key: String,
    pub team_a_name: String,
    pub team_b_key: String,
    pub team_b_name: String,
    pub score_a: u32,
    pub score_b: u32,
    pub competition: String,
    pub source_url: String,
    pub age_context: AgeContext,
    pub match_confidence: String,
}

/// Whether the opponent of a match was registered in this division's own
/// roster or an adjacent age group's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeContext {
    Own,
    Older,
    Younger,
    Unknown,
}

impl AgeContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeContext::Own => "own",
            AgeContext::Older => "older",
            AgeContext::Younger => "younger",
            AgeContext::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "own" => AgeContext::Own,
            "older" => AgeContext::Older,
            "younger" => AgeContext::Younger,
            _ => AgeContext::Unknown,
        }
    }
}

/// How an opponent name was reconciled against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchTier {
    Exact,
    Normalized,
    Fuzzy(f64),
    /// Synthesized external team; carries the `ext::` key.
    External(String),
}

impl MatchTier {
    /// Label recorded in the gold `match_confidence` column.
    pub fn label(&self) -> String {
        match self {
            MatchTier::Exact => "exact".to_string(),
            MatchTier::Normalized => "normalized".to_string(),
            MatchTier::Fuzzy(score) => format!("fuzzy:{:.2}", score),
            MatchTier::External(key) => format!("external:{}", key),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            MatchTier::Exact => 1.0,
            MatchTier::Normalized => 0.95,
            MatchTier::Fuzzy(score) => *score,
            MatchTier::External(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamStatus {
    Active,
    Provisional,
    Inactive,
}

impl TeamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamStatus::Active => "Active",
            TeamStatus::Provisional => "Provisional",
            TeamStatus::Inactive => "Inactive",
        }
    }
}

/// Mutable per-team state during one ranking run; discarded at the end.
#[derive(Debug, Clone)]
pub struct RatingState {
    pub team_key: String,
    pub rating: f64,
    pub offense_raw: f64,
    pub defense_raw: f64,
    pub sos_raw: f64,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub last_game_date: NaiveDate,
    pub status: TeamStatus,
}

/// One row of the rankings output file.
#[derive(Debug, Clone, Serialize)]
pub struct RankingRow {
    pub rank: u32,
    pub team_key: String,
    pub team_name: String,
    pub state: String,
    pub status: TeamStatus,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub offense_raw: f64,
    pub defense_raw: f64,
    pub sos_raw: f64,
    pub offense_norm: f64,
    pub defense_norm: f64,
    pub sos_norm: f64,
    pub power_score: f64,
    pub games_penalty: f64,
    pub power_score_adj: f64,
    pub last_game_date: NaiveDate,
    pub cross_age_games: u32,
    pub cross_age_pct: f64,
    pub cross_state_games: u32,
    pub cross_state_pct: f64,
}

/// One row of the connectivity report.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityRow {
    pub team_key: String,
    pub component_id: u32,
    pub component_size: u32,
    pub degree: u32,
}

/// Per-division outcome counters reported after a Stage 2 run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub zero_match: usize,
    pub failed: usize,
}

/// One line of the append-only scrape error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub ts: DateTime<Utc>,
    pub division: String,
    pub team_key: String,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_tier_labels() {
        assert_eq!(MatchTier::Exact.label(), "exact");
        assert_eq!(MatchTier::Normalized.label(), "normalized");
        assert_eq!(MatchTier::Fuzzy(0.874).label(), "fuzzy:0.87");
        assert_eq!(
            MatchTier::External("ext::desert elite 2014".into()).label(),
            "external:ext::desert elite 2014"
        );
    }

    #[test]
    fn test_tier_confidence() {
        assert_eq!(MatchTier::Exact.confidence(), 1.0);
        assert_eq!(MatchTier::Normalized.confidence(), 0.95);
        assert!((MatchTier::Fuzzy(0.9).confidence() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_age_context_round_trip() {
        for ctx in [
            AgeContext::Own,
            AgeContext::Older,
            AgeContext::Younger,
            AgeContext::Unknown,
        ] {
            assert_eq!(AgeContext::parse(ctx.as_str()), ctx);
        }
        assert_eq!(AgeContext::parse("garbage"), AgeContext::Unknown);
    }
}
