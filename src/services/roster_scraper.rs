use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

use crate::config::ScrapeConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Division, RosterTeam};
use crate::services::normalizer;
use crate::storage::{self, DataPaths};

// Upstream roster payload. The platform serves either a bare array or an
// envelope, and team ids arrive as strings or numbers depending on endpoint
// version.
#[derive(Debug, Deserialize)]
struct RosterEnvelope {
    teams: Vec<UpstreamRosterTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamRosterTeam {
    #[serde(default)]
    id: Option<UpstreamId>,
    name: String,
    #[serde(default)]
    club: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamId {
    Text(String),
    Number(u64),
}

impl UpstreamId {
    fn into_string(self) -> String {
        match self {
            UpstreamId::Text(s) => s,
            UpstreamId::Number(n) => n.to_string(),
        }
    }
}

pub struct RosterScraper {
    client: Client,
    config: ScrapeConfig,
}

impl RosterScraper {
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Stage 1: fetch the division roster, extract teams, write the bronze
    /// CSV atomically and append a scrape event.
    pub async fn run(
        &self,
        division: &Division,
        paths: &DataPaths,
        scraped_at: DateTime<Utc>,
    ) -> Result<Vec<RosterTeam>> {
        tracing::info!("Fetching roster for {} from {}", division.key, division.roster_url);

        let body = self.fetch_with_retries(&division.roster_url).await?;
        let mut teams = extract_roster(&body, scraped_at)?;

        if teams.is_empty() {
            if self.config.allow_empty {
                tracing::warn!("Upstream returned zero teams for {} (override set)", division.key);
            } else {
                return Err(PipelineError::EmptyUpstream(division.key.clone()));
            }
        }

        let missing_ids = teams.iter().filter(|t| t.external_id.is_none()).count();
        if missing_ids > 0 {
            tracing::warn!(
                "{} of {} roster teams have no external id and will be skipped by the match scraper",
                missing_ids,
                teams.len()
            );
        }

        // stable output ordering keeps reruns byte-identical
        teams.sort_by(|a, b| a.team_key.cmp(&b.team_key));
        storage::write_bronze(&paths.bronze, &teams)?;
        storage::append_event(
            &paths.event_log,
            &json!({
                "ts": scraped_at.to_rfc3339(),
                "division": division.key,
                "stage": "roster",
                "teams": teams.len(),
                "external_id_missing": missing_ids,
            }),
        )?;

        tracing::info!("Wrote {} roster teams to {}", teams.len(), paths.bronze.display());
        Ok(teams)
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<String> {
        let mut last_error = PipelineError::TransientHttp("no attempts made".to_string());
        for attempt in 1..=self.config.max_attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retriable() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                    tracing::warn!("Roster fetch attempt {} failed ({}); retrying in {:?}", attempt, e, delay);
                    tokio::time::sleep(delay).await;
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::TransientHttp(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PipelineError::RateLimited(format!("HTTP 429 from {}", url)));
        }
        if !status.is_success() {
            return Err(PipelineError::TransientHttp(format!("HTTP {} from {}", status, url)));
        }
        response
            .text()
            .await
            .map_err(|e| PipelineError::TransientHttp(e.to_string()))
    }
}

/// Extract roster rows from an upstream body, probing for JSON first and
/// falling back to the server-rendered HTML table.
pub fn extract_roster(body: &str, scraped_at: DateTime<Utc>) -> Result<Vec<RosterTeam>> {
    let trimmed = body.trim_start();
    let upstream = if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json_roster(body)?
    } else {
        parse_html_roster(body)
    };

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut by_key: HashSet<String> = HashSet::new();
    let mut teams = Vec::new();
    for team in upstream {
        let name = team.name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let team_key = normalizer::normalize(&name);
        let external_id = team.id.map(UpstreamId::into_string);
        if !seen.insert((team_key.clone(), external_id.clone())) {
            continue;
        }
        // bronze rows are unique by team_key; first listing wins
        if !by_key.insert(team_key.clone()) {
            tracing::warn!("Duplicate roster key '{}' for '{}'; keeping first", team_key, name);
            continue;
        }
        teams.push(RosterTeam {
            team_name: name,
            team_key,
            external_id,
            club: team.club.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            state: team
                .state
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            scraped_at,
        });
    }
    Ok(teams)
}

fn parse_json_roster(body: &str) -> Result<Vec<UpstreamRosterTeam>> {
    if let Ok(teams) = serde_json::from_str::<Vec<UpstreamRosterTeam>>(body) {
        return Ok(teams);
    }
    let envelope: RosterEnvelope = serde_json::from_str(body)?;
    Ok(envelope.teams)
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Server-rendered fallback: find the first table whose header names a team
/// column, then read one roster row per body row. The team id comes from the
/// row's link (`/teams/{id}`) or a `data-team-id` attribute.
fn parse_html_roster(body: &str) -> Vec<UpstreamRosterTeam> {
    let doc = Html::parse_document(body);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let header_selector = Selector::parse("th,td").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut teams = Vec::new();
    for table in doc.select(&table_selector) {
        let mut rows = table.select(&row_selector);
        let Some(header) = rows.next() else { continue };
        let headers: Vec<String> = header
            .select(&header_selector)
            .map(|h| cell_text(h).to_lowercase())
            .collect();

        let find_column = |needle: &str| headers.iter().position(|h| h.contains(needle));
        let Some(name_col) = find_column("team") else { continue };
        let club_col = find_column("club");
        let state_col = find_column("state");

        for row in rows {
            let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
            let Some(name_cell) = cells.get(name_col) else { continue };
            let name = cell_text(*name_cell);
            if name.is_empty() {
                continue;
            }

            let id = name_cell
                .select(&link_selector)
                .next()
                .and_then(|a| {
                    a.value()
                        .attr("data-team-id")
                        .map(|v| v.to_string())
                        .or_else(|| {
                            a.value()
                                .attr("href")
                                .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
                                .filter(|seg| !seg.is_empty())
                                .map(|seg| seg.to_string())
                        })
                })
                .map(UpstreamId::Text);

            teams.push(UpstreamRosterTeam {
                id,
                name,
                club: club_col.and_then(|c| cells.get(c)).map(|c| cell_text(*c)),
                state: state_col.and_then(|c| cells.get(c)).map(|c| cell_text(*c)),
            });
        }
        if !teams.is_empty() {
            break;
        }
    }
    teams
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_bare_json_array() {
        let body = r#"[
            {"id": 4417, "name": "Phoenix United 2015 Premier", "club": "Phoenix United", "state": "AZ"},
            {"id": "T-9001", "name": "Scottsdale Surf 2015", "club": "Scottsdale Surf", "state": "AZ"}
        ]"#;
        let teams = extract_roster(body, ts()).unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].external_id.as_deref(), Some("4417"));
        assert_eq!(teams[1].external_id.as_deref(), Some("T-9001"));
        assert_eq!(teams[0].state.as_deref(), Some("az"));
        assert_eq!(teams[0].team_key, normalizer::normalize("Phoenix United 2015 Premier"));
    }

    #[test]
    fn test_extract_json_envelope() {
        let body = r#"{"teams": [{"id": 1, "name": "Tucson Fire 2015 Red"}]}"#;
        let teams = extract_roster(body, ts()).unwrap();
        assert_eq!(teams.len(), 1);
        assert!(teams[0].club.is_none());
    }

    #[test]
    fn test_extract_html_table() {
        let body = r#"
            <html><body>
            <table>
              <tr><th>Rank</th><th>Team</th><th>Club</th><th>State</th></tr>
              <tr><td>1</td><td><a href="/teams/4417">Phoenix United 2015 Premier</a></td><td>Phoenix United</td><td>AZ</td></tr>
              <tr><td>2</td><td><a href="/teams/9001/">Scottsdale Surf 2015</a></td><td>Scottsdale Surf</td><td>AZ</td></tr>
              <tr><td>3</td><td>Unlinked Team 2015</td><td></td><td>AZ</td></tr>
            </table>
            </body></html>
        "#;
        let teams = extract_roster(body, ts()).unwrap();
        assert_eq!(teams.len(), 3);
        assert_eq!(teams[0].external_id.as_deref(), Some("4417"));
        assert_eq!(teams[1].external_id.as_deref(), Some("9001"));
        assert!(teams[2].external_id.is_none(), "unlinked rows are kept but flagged");
    }

    #[test]
    fn test_duplicate_rows_collapse_by_key() {
        let body = r#"[
            {"id": 1, "name": "Mesa Arsenal 2015"},
            {"id": 1, "name": "Mesa Arsenal 2015"},
            {"id": 2, "name": "Mesa - Arsenal 2015"}
        ]"#;
        let teams = extract_roster(body, ts()).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].external_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_blank_names_are_dropped() {
        let body = r#"[{"id": 1, "name": "   "}, {"id": 2, "name": "Yuma Strikers 2015"}]"#;
        let teams = extract_roster(body, ts()).unwrap();
        assert_eq!(teams.len(), 1);
    }
}
