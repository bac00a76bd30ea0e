use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use statrs::statistics::Statistics;

use crate::config::RankConfig;
use crate::error::{PipelineError, Result};
use crate::models::{AgeContext, MatchRow, RankingRow, RatingState, RosterTeam, TeamStatus};
use crate::services::normalizer;

/// Summary of one ranking run, surfaced by the CLI and the event log.
#[derive(Debug, Clone)]
pub struct EngineSummary {
    pub iterations: u32,
    pub converged: bool,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub ranked_teams: usize,
    pub active: usize,
    pub provisional: usize,
    pub inactive: usize,
    pub external_opponents: usize,
}

#[derive(Debug)]
pub struct RankingOutcome {
    pub rows: Vec<RankingRow>,
    pub summary: EngineSummary,
}

/// Where a tracked team's roster entry came from, relative to the division
/// being ranked. Drives cross-age context between any two tracked teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RosterTier {
    Master,
    Older,
    Younger,
}

impl RosterTier {
    fn age_rank(self) -> i8 {
        match self {
            RosterTier::Master => 0,
            RosterTier::Older => 1,
            RosterTier::Younger => -1,
        }
    }
}

/// Flat per-team slot; matches and views refer to teams by index, never by
/// reference, so the cyclic opponent graph stays index-based.
struct TeamSlot {
    display_name: String,
    state: Option<String>,
    tier: RosterTier,
    rating: RatingState,
    // indices into the global view table, most recent first
    views: Vec<usize>,
    weights: Vec<f64>,
}

/// Opponent of a directed view: a tracked slot, or an external team held at
/// the default strength prior.
#[derive(Debug, Clone, Copy)]
enum Opponent {
    Tracked(usize),
    External,
}

struct ViewRec {
    team: usize,
    opponent: Opponent,
    opponent_key_order: usize, // position in the sorted key table, for stable sorting
    goals_for: u32,
    goals_against: u32,
    date: NaiveDate,
    age_context: AgeContext,
    cross_state: bool,
}

pub struct RankingEngine {
    config: RankConfig,
}

impl RankingEngine {
    pub fn new(config: RankConfig) -> Self {
        Self { config }
    }

    /// Compute rankings for a division from its gold match table and master
    /// roster. Adjacent-age rosters are consulted only for opponent lookup.
    pub fn rank(
        &self,
        matches: &[MatchRow],
        roster: &[RosterTeam],
        older: Option<&[RosterTeam]>,
        younger: Option<&[RosterTeam]>,
        today: NaiveDate,
    ) -> Result<RankingOutcome> {
        if roster.is_empty() {
            return Err(PipelineError::MalformedInput {
                path: "master roster".to_string(),
                reason: "no teams".to_string(),
            });
        }
        let window_end = matches
            .iter()
            .map(|m| m.date)
            .max()
            .unwrap_or(today);
        let window_start = window_end - Duration::days(self.config.window_days);

        let (mut slots, key_index, views, external_opponents) =
            self.build_state(matches, roster, older, younger, window_start, window_end)?;

        self.accumulate_metrics(&mut slots, &views, today);
        let (iterations, converged) = self.iterate_ratings(&mut slots, &views);
        self.compute_sos(&mut slots, &views);

        let rows = self.build_rows(&slots, &views, &key_index);
        let mut active = 0;
        let mut provisional = 0;
        let mut inactive = 0;
        for row in &rows {
            match row.status {
                TeamStatus::Active => active += 1,
                TeamStatus::Provisional => provisional += 1,
                TeamStatus::Inactive => inactive += 1,
            }
        }

        let summary = EngineSummary {
            iterations,
            converged,
            window_start,
            window_end,
            ranked_teams: rows.len(),
            active,
            provisional,
            inactive,
            external_opponents,
        };
        if !converged {
            tracing::warn!(
                "Rating solver hit the {}-iteration cap without converging",
                self.config.max_iterations
            );
        }
        Ok(RankingOutcome { rows, summary })
    }

    /// Build the flat team table and the directed view table from the match
    /// set: window filter, master-roster filter, per-team 30-view cap, and
    /// tapered weights.
    #[allow(clippy::type_complexity)]
    fn build_state(
        &self,
        matches: &[MatchRow],
        roster: &[RosterTeam],
        older: Option<&[RosterTeam]>,
        younger: Option<&[RosterTeam]>,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<(Vec<TeamSlot>, HashMap<String, usize>, Vec<ViewRec>, usize)> {
        // the opponent directory: own roster wins collisions, then older, then
        // younger, matching the cross-age lookup order
        let mut slots: Vec<TeamSlot> = Vec::new();
        let mut key_index: HashMap<String, usize> = HashMap::new();
        let mut add_roster = |teams: &[RosterTeam], tier: RosterTier| {
            for team in teams {
                if key_index.contains_key(&team.team_key) {
                    continue;
                }
                key_index.insert(team.team_key.clone(), slots.len());
                slots.push(TeamSlot {
                    display_name: team.team_name.clone(),
                    state: team.state.clone(),
                    tier,
                    rating: empty_rating(&team.team_key),
                    views: Vec::new(),
                    weights: Vec::new(),
                });
            }
        };
        add_roster(roster, RosterTier::Master);
        if let Some(teams) = older {
            add_roster(teams, RosterTier::Older);
        }
        if let Some(teams) = younger {
            add_roster(teams, RosterTier::Younger);
        }

        // sorted key order gives views a stable opponent tie-break
        let mut sorted_keys: Vec<&String> = key_index.keys().collect();
        sorted_keys.sort();
        let key_order: HashMap<&String, usize> =
            sorted_keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        // window + master filter, collapsing duplicate primary keys
        let mut seen: HashSet<(NaiveDate, &str, &str)> = HashSet::new();
        let mut kept: Vec<&MatchRow> = Vec::new();
        for row in matches {
            if row.date <= window_start || row.date > window_end {
                continue;
            }
            let a_master = key_index
                .get(&row.team_a_key)
                .map(|&i| slots[i].tier == RosterTier::Master)
                .unwrap_or(false);
            let b_master = key_index
                .get(&row.team_b_key)
                .map(|&i| slots[i].tier == RosterTier::Master)
                .unwrap_or(false);
            if !a_master && !b_master {
                continue;
            }
            if !seen.insert((row.date, row.team_a_key.as_str(), row.team_b_key.as_str())) {
                continue;
            }
            if normalizer::is_external_key(&row.team_a_key) && normalizer::is_external_key(&row.team_b_key) {
                return Err(PipelineError::MalformedInput {
                    path: "gold matches".to_string(),
                    reason: format!("row {} has two external teams", row.date),
                });
            }
            kept.push(row);
        }

        // explode into directed views for every tracked side
        let mut external_keys: HashSet<&str> = HashSet::new();
        let mut views: Vec<ViewRec> = Vec::new();
        for row in &kept {
            for (own_key, opp_key, gf, ga) in [
                (&row.team_a_key, &row.team_b_key, row.score_a, row.score_b),
                (&row.team_b_key, &row.team_a_key, row.score_b, row.score_a),
            ] {
                let Some(&team_idx) = key_index.get(own_key) else { continue };
                let opponent = match key_index.get(opp_key) {
                    Some(&idx) => Opponent::Tracked(idx),
                    None => {
                        external_keys.insert(opp_key.as_str());
                        Opponent::External
                    }
                };
                let age_context = match opponent {
                    Opponent::Tracked(opp_idx) => {
                        relative_age(slots[team_idx].tier, slots[opp_idx].tier)
                    }
                    Opponent::External => AgeContext::Unknown,
                };
                let cross_state = match opponent {
                    Opponent::Tracked(opp_idx) => match (&slots[team_idx].state, &slots[opp_idx].state) {
                        (Some(a), Some(b)) => a != b,
                        _ => false,
                    },
                    Opponent::External => false,
                };
                views.push(ViewRec {
                    team: team_idx,
                    opponent,
                    opponent_key_order: key_order.get(opp_key).copied().unwrap_or(usize::MAX),
                    goals_for: gf,
                    goals_against: ga,
                    date: row.date,
                    age_context,
                    cross_state,
                });
            }
        }

        // per-team: newest first, cap, taper
        let mut per_team: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
        for (i, view) in views.iter().enumerate() {
            per_team[view.team].push(i);
        }
        for (team_idx, view_ids) in per_team.iter_mut().enumerate() {
            view_ids.sort_by(|&x, &y| {
                let vx = &views[x];
                let vy = &views[y];
                vy.date
                    .cmp(&vx.date)
                    .then(vx.opponent_key_order.cmp(&vy.opponent_key_order))
                    .then(vx.goals_for.cmp(&vy.goals_for))
                    .then(vx.goals_against.cmp(&vy.goals_against))
            });
            view_ids.truncate(self.config.max_views);
            slots[team_idx].weights = self.taper_weights(view_ids.len());
            slots[team_idx].views = view_ids.clone();
        }

        Ok((slots, key_index, views, external_keys.len()))
    }

    /// Tapered segment weights over a team's views, most recent first: 60%
    /// of the mass on ranks 1-10, 30% on 11-25, 10% on 26-30, uniform within
    /// a segment, renormalized to sum to 1 when segments are partially
    /// filled.
    fn taper_weights(&self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        let bounds = self.config.segment_bounds;
        let mass = self.config.segment_mass;
        let mut weights = vec![0.0; n];
        let mut segment_start = 0usize;
        for (segment, &bound) in bounds.iter().enumerate() {
            let segment_end = bound.min(n);
            if segment_end > segment_start {
                let per_view = mass[segment] / (bound - segment_start) as f64;
                for w in weights.iter_mut().take(segment_end).skip(segment_start) {
                    *w = per_view;
                }
            }
            segment_start = bound;
            if segment_start >= n {
                break;
            }
        }
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        weights
    }

    /// Per-team raw offense/defense, record, last game date and status.
    fn accumulate_metrics(&self, slots: &mut [TeamSlot], views: &[ViewRec], today: NaiveDate) {
        let cap = self.config.score_cap as f64;
        for slot in slots.iter_mut() {
            let rating = &mut slot.rating;
            for (&view_id, &weight) in slot.views.iter().zip(slot.weights.iter()) {
                let view = &views[view_id];
                rating.offense_raw += weight * (view.goals_for as f64).min(cap);
                rating.defense_raw += weight * (view.goals_against as f64).min(cap);
                rating.games_played += 1;
                rating.goals_for += view.goals_for;
                rating.goals_against += view.goals_against;
                match view.goals_for.cmp(&view.goals_against) {
                    std::cmp::Ordering::Greater => rating.wins += 1,
                    std::cmp::Ordering::Less => rating.losses += 1,
                    std::cmp::Ordering::Equal => rating.ties += 1,
                }
                if view.date > rating.last_game_date {
                    rating.last_game_date = view.date;
                }
            }
            rating.status = if rating.games_played < self.config.active_min_games {
                TeamStatus::Provisional
            } else if (today - rating.last_game_date).num_days() <= self.config.inactive_after_days {
                TeamStatus::Active
            } else {
                TeamStatus::Inactive
            };
        }
    }

    /// Iterative opponent-strength refinement. Ratings start from
    /// win-percentage mapped into [0.2, 0.8] and recentered to a 0.5 mean;
    /// external opponents stay pinned at the default strength prior.
    ///
    /// Each iteration evaluates every directed view against a start-of-pass
    /// snapshot and applies the accumulated deltas at once, so the pass is
    /// symmetric across each match pair and independent of visit order.
    fn iterate_ratings(&self, slots: &mut [TeamSlot], views: &[ViewRec]) -> (u32, bool) {
        let with_games: Vec<usize> = (0..slots.len())
            .filter(|&i| slots[i].rating.games_played > 0)
            .collect();
        if with_games.is_empty() {
            return (0, true);
        }

        for &i in &with_games {
            let rating = &slots[i].rating;
            let win_pct = (rating.wins as f64 + 0.5 * rating.ties as f64) / rating.games_played as f64;
            slots[i].rating.rating = 0.2 + 0.6 * win_pct;
        }
        let mean: f64 = with_games
            .iter()
            .map(|&i| slots[i].rating.rating)
            .sum::<f64>()
            / with_games.len() as f64;
        for &i in &with_games {
            slots[i].rating.rating += 0.5 - mean;
        }

        let config = &self.config;
        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iterations {
            iterations += 1;
            let snapshot: Vec<f64> = slots.iter().map(|s| s.rating.rating).collect();
            let mut deltas = vec![0.0f64; slots.len()];

            for &team_idx in &with_games {
                let games = slots[team_idx].rating.games_played as f64;
                for &view_id in &slots[team_idx].views {
                    let view = &views[view_id];
                    let own = snapshot[team_idx];
                    let opp = match view.opponent {
                        Opponent::Tracked(idx) => snapshot[idx],
                        Opponent::External => config.default_opponent_strength,
                    };

                    let expected = 1.0 / (1.0 + (-config.k * (own - opp)).exp());
                    let observed = match view.goals_for.cmp(&view.goals_against) {
                        std::cmp::Ordering::Greater => 1.0,
                        std::cmp::Ordering::Less => 0.0,
                        std::cmp::Ordering::Equal => 0.5,
                    };
                    let margin = if view.goals_for == view.goals_against {
                        1.0
                    } else {
                        let diff = (view.goals_for as f64 - view.goals_against as f64)
                            .clamp(-(config.score_cap as f64), config.score_cap as f64);
                        (1.0 + config.margin_step * diff)
                            .clamp(config.margin_clamp.0, config.margin_clamp.1)
                    };
                    let cross_age = if view.age_context == AgeContext::Older {
                        config.cross_age_multiplier
                    } else {
                        1.0
                    };
                    let gap = (own - opp).max(0.0);
                    let eta = config.eta_base * (1.0 / (1.0 + gap.powf(config.alpha)))
                        * (games / 8.0).powf(config.beta).min(1.0);

                    deltas[team_idx] += eta * cross_age * (observed * margin - expected);
                }
            }

            let mut total_abs_delta = 0.0;
            for &i in &with_games {
                slots[i].rating.rating += deltas[i];
                total_abs_delta += deltas[i].abs();
            }
            let mad = total_abs_delta / with_games.len() as f64;
            if mad < config.convergence_threshold {
                converged = true;
                break;
            }
        }
        (iterations, converged)
    }

    /// Weighted mean of opponent ratings per team, with an outlier clip so a
    /// single extreme opponent cannot dominate a thin schedule.
    fn compute_sos(&self, slots: &mut [TeamSlot], views: &[ViewRec]) {
        let opponent_rating = |view: &ViewRec, slots: &[TeamSlot]| match view.opponent {
            Opponent::Tracked(idx) => slots[idx].rating.rating,
            Opponent::External => self.config.default_opponent_strength,
        };

        let all_opponent_ratings: Vec<f64> = slots
            .iter()
            .flat_map(|slot| slot.views.iter().map(|&id| opponent_rating(&views[id], slots)))
            .collect();
        if all_opponent_ratings.is_empty() {
            return;
        }
        let mu = all_opponent_ratings.iter().mean();
        let sigma = all_opponent_ratings.iter().population_std_dev();
        let (low, high) = if sigma > 0.0 {
            (mu - self.config.clip_sigmas * sigma, mu + self.config.clip_sigmas * sigma)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        };

        for team_idx in 0..slots.len() {
            let mut sos = 0.0;
            for (pos, &view_id) in slots[team_idx].views.iter().enumerate() {
                let weight = slots[team_idx].weights[pos];
                let rating = opponent_rating(&views[view_id], slots).clamp(low, high);
                sos += weight * rating;
            }
            slots[team_idx].rating.sos_raw = sos;
        }
    }

    /// Logistic normalization, composite power score and the final ranked
    /// rows for master-roster teams.
    fn build_rows(
        &self,
        slots: &[TeamSlot],
        views: &[ViewRec],
        key_index: &HashMap<String, usize>,
    ) -> Vec<RankingRow> {
        let mut ranked: Vec<usize> = key_index
            .values()
            .copied()
            .filter(|&i| slots[i].tier == RosterTier::Master && slots[i].rating.games_played > 0)
            .collect();
        ranked.sort();
        if ranked.is_empty() {
            return Vec::new();
        }

        let normalize = |values: Vec<f64>| -> Vec<f64> {
            let mu = values.iter().mean();
            let sigma = values.iter().population_std_dev();
            if sigma == 0.0 {
                return vec![0.5; values.len()];
            }
            values
                .iter()
                .map(|v| 1.0 / (1.0 + (-(v - mu) / (self.config.sigma_scale * sigma)).exp()))
                .collect()
        };

        let offense_norm = normalize(ranked.iter().map(|&i| slots[i].rating.offense_raw).collect());
        let defense_norm: Vec<f64> = normalize(ranked.iter().map(|&i| slots[i].rating.defense_raw).collect())
            .into_iter()
            .map(|v| 1.0 - v) // fewer goals against is better
            .collect();
        let sos_norm = normalize(ranked.iter().map(|&i| slots[i].rating.sos_raw).collect());

        let mut rows: Vec<RankingRow> = Vec::with_capacity(ranked.len());
        for (pos, &slot_idx) in ranked.iter().enumerate() {
            let slot = &slots[slot_idx];
            let rating = &slot.rating;
            let power_score = self.config.offense_weight * offense_norm[pos]
                + self.config.defense_weight * defense_norm[pos]
                + self.config.sos_weight * sos_norm[pos];
            let games_penalty = ((rating.games_played.min(self.config.games_penalty_cap) as f64)
                / self.config.games_penalty_cap as f64)
                .sqrt();

            let mut cross_age_games = 0u32;
            let mut cross_state_games = 0u32;
            for &view_id in &slot.views {
                let view = &views[view_id];
                if matches!(view.age_context, AgeContext::Older | AgeContext::Younger) {
                    cross_age_games += 1;
                }
                if view.cross_state {
                    cross_state_games += 1;
                }
            }

            let games = rating.games_played as f64;
            rows.push(RankingRow {
                rank: 0, // assigned after sorting
                team_key: rating.team_key.clone(),
                team_name: slot.display_name.clone(),
                state: slot.state.clone().unwrap_or_default(),
                status: rating.status,
                games_played: rating.games_played,
                wins: rating.wins,
                losses: rating.losses,
                ties: rating.ties,
                goals_for: rating.goals_for,
                goals_against: rating.goals_against,
                offense_raw: rating.offense_raw,
                defense_raw: rating.defense_raw,
                sos_raw: rating.sos_raw,
                offense_norm: offense_norm[pos],
                defense_norm: defense_norm[pos],
                sos_norm: sos_norm[pos],
                power_score,
                games_penalty,
                power_score_adj: power_score * games_penalty,
                last_game_date: rating.last_game_date,
                cross_age_games,
                cross_age_pct: 100.0 * cross_age_games as f64 / games,
                cross_state_games,
                cross_state_pct: 100.0 * cross_state_games as f64 / games,
            });
        }

        rows.sort_by(|x, y| {
            y.power_score_adj
                .total_cmp(&x.power_score_adj)
                .then(y.games_played.cmp(&x.games_played))
                .then(x.team_key.cmp(&y.team_key))
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = (i + 1) as u32;
        }
        rows
    }
}

fn relative_age(own: RosterTier, opponent: RosterTier) -> AgeContext {
    match opponent.age_rank() - own.age_rank() {
        0 => AgeContext::Own,
        d if d > 0 => AgeContext::Older,
        _ => AgeContext::Younger,
    }
}

fn empty_rating(team_key: &str) -> RatingState {
    RatingState {
        team_key: team_key.to_string(),
        rating: 0.0,
        offense_raw: 0.0,
        defense_raw: 0.0,
        sos_raw: 0.0,
        games_played: 0,
        wins: 0,
        losses: 0,
        ties: 0,
        goals_for: 0,
        goals_against: 0,
        last_game_date: NaiveDate::MIN,
        status: TeamStatus::Provisional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn roster_team(name: &str, state: &str) -> RosterTeam {
        RosterTeam {
            team_name: name.to_string(),
            team_key: normalizer::normalize(name),
            external_id: Some("T".to_string()),
            club: None,
            state: Some(state.to_string()),
            scraped_at: Utc::now(),
        }
    }

    fn gold_row(date: NaiveDate, a: &RosterTeam, b: &RosterTeam, score_a: u32, score_b: u32) -> MatchRow {
        let (first, second, sa, sb) = if a.team_key <= b.team_key {
            (a, b, score_a, score_b)
        } else {
            (b, a, score_b, score_a)
        };
        MatchRow {
            date,
            team_a_key: first.team_key.clone(),
            team_a_name: first.team_name.clone(),
            team_b_key: second.team_key.clone(),
            team_b_name: second.team_name.clone(),
            score_a: sa,
            score_b: sb,
            competition: "State League".to_string(),
            source_url: String::new(),
            age_context: AgeContext::Own,
            match_confidence: "exact".to_string(),
        }
    }

    fn external_row(date: NaiveDate, team: &RosterTeam, opponent: &str, gf: u32, ga: u32) -> MatchRow {
        let ext_key = normalizer::external_key(opponent);
        let (a_key, a_name, b_key, b_name, sa, sb) = if team.team_key <= ext_key {
            (team.team_key.clone(), team.team_name.clone(), ext_key, opponent.to_string(), gf, ga)
        } else {
            (ext_key, opponent.to_string(), team.team_key.clone(), team.team_name.clone(), ga, gf)
        };
        MatchRow {
            date,
            team_a_key: a_key,
            team_a_name: a_name,
            team_b_key: b_key,
            team_b_name: b_name,
            score_a: sa,
            score_b: sb,
            competition: String::new(),
            source_url: String::new(),
            age_context: AgeContext::Unknown,
            match_confidence: "external:x".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> RankingEngine {
        RankingEngine::new(RankConfig::default())
    }

    #[test]
    fn test_taper_weights_full_history() {
        let weights = engine().taper_weights(30);
        assert_eq!(weights.len(), 30);
        let first: f64 = weights[..10].iter().sum();
        let middle: f64 = weights[10..25].iter().sum();
        let last: f64 = weights[25..].iter().sum();
        assert!((first - 0.6).abs() < 1e-9);
        assert!((middle - 0.3).abs() < 1e-9);
        assert!((last - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_taper_weights_sum_to_one() {
        for n in [1, 3, 5, 10, 12, 25, 28, 30] {
            let weights = engine().taper_weights(n);
            assert_eq!(weights.len(), n);
            let total: f64 = weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "n={} sums to {}", n, total);
        }
    }

    #[test]
    fn test_taper_weights_short_history_is_uniform() {
        let weights = engine().taper_weights(5);
        for w in &weights {
            assert!((w - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_thirty_five_views_keep_thirty() {
        let team = roster_team("Scottsdale Surf 2015", "az");
        let roster = vec![team.clone()];
        let mut matches = Vec::new();
        for i in 0..35u32 {
            matches.push(external_row(
                date(2026, 1, 1) + Duration::days(i as i64),
                &team,
                &format!("Visitor {:02}", i),
                2,
                1,
            ));
        }
        let engine = engine();
        let window_end = date(2026, 2, 4);
        let (slots, key_index, _views, _ext) = engine
            .build_state(&matches, &roster, None, None, window_end - Duration::days(365), window_end)
            .unwrap();
        let slot = &slots[key_index[&team.team_key]];
        assert_eq!(slot.views.len(), 30);
        let first: f64 = slot.weights[..10].iter().sum();
        let middle: f64 = slot.weights[10..25].iter().sum();
        let last: f64 = slot.weights[25..].iter().sum();
        assert!((first - 0.6).abs() < 1e-9);
        assert!((middle - 0.3).abs() < 1e-9);
        assert!((last - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_two_team_closed_league() {
        let a = roster_team("Alpha 2015", "az");
        let b = roster_team("Bravo 2015", "az");
        let roster = vec![a.clone(), b.clone()];
        let matches = vec![
            gold_row(date(2026, 3, 1), &a, &b, 2, 1),
            gold_row(date(2026, 3, 15), &b, &a, 0, 3),
        ];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 4, 1))
            .unwrap();
        assert_eq!(outcome.rows.len(), 2);

        let row_a = outcome.rows.iter().find(|r| r.team_key == a.team_key).unwrap();
        let row_b = outcome.rows.iter().find(|r| r.team_key == b.team_key).unwrap();
        // two games each: below the five-game floor
        assert_eq!(row_a.status, TeamStatus::Provisional);
        assert_eq!(row_b.status, TeamStatus::Provisional);
        assert_eq!(row_a.wins, 2);
        assert_eq!(row_b.losses, 2);
        assert!(row_a.offense_raw > row_b.offense_raw);
        assert!(row_a.defense_raw < row_b.defense_raw);
        // ranks are contiguous from 1
        let mut ranks: Vec<u32> = outcome.rows.iter().map(|r| r.rank).collect();
        ranks.sort();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn test_cross_age_win_moves_rating_five_percent_more() {
        let x = roster_team("Xray 2015", "az");
        let x2 = roster_team("Xylo 2015", "az");
        let y2 = roster_team("Yankee 2015", "az");
        let y_older = roster_team("Yuma 2014", "az");
        let roster = vec![x.clone(), x2.clone(), y2.clone()];
        let older = vec![y_older.clone()];
        let matches = vec![
            gold_row(date(2026, 3, 1), &x, &y_older, 2, 0),
            gold_row(date(2026, 3, 1), &x2, &y2, 2, 0),
        ];

        let mut config = RankConfig::default();
        config.max_iterations = 1;
        let engine = RankingEngine::new(config);
        let window_end = date(2026, 3, 1);
        let (mut slots, key_index, views, _ext) = engine
            .build_state(&matches, &roster, Some(&older), None, window_end - Duration::days(365), window_end)
            .unwrap();
        engine.accumulate_metrics(&mut slots, &views, date(2026, 4, 1));
        engine.iterate_ratings(&mut slots, &views);

        // both winners start at 0.8 against a 0.2 opponent; the only
        // difference is the older-opponent multiplier
        let delta_cross = slots[key_index[&x.team_key]].rating.rating - 0.8;
        let delta_own = slots[key_index[&x2.team_key]].rating.rating - 0.8;
        assert!(delta_own > 0.0);
        assert!(((delta_cross / delta_own) - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_external_opponents_hold_default_strength() {
        let z = roster_team("Zulu 2015", "az");
        let roster = vec![z.clone()];
        let matches = vec![
            external_row(date(2026, 2, 1), &z, "Out Of State Raiders", 1, 1),
            external_row(date(2026, 2, 8), &z, "Travelling Eagles", 0, 2),
        ];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 3, 1))
            .unwrap();
        // external teams never appear in the output
        assert_eq!(outcome.rows.len(), 1);
        let row = &outcome.rows[0];
        assert_eq!(row.team_key, z.team_key);
        assert!((row.sos_raw - 0.35).abs() < 1e-9);
        assert_eq!(outcome.summary.external_opponents, 2);
    }

    #[test]
    fn test_score_cap_limits_offense_and_defense() {
        let a = roster_team("Alpha 2015", "az");
        let b = roster_team("Bravo 2015", "az");
        let roster = vec![a.clone(), b.clone()];
        let matches = vec![gold_row(date(2026, 3, 1), &a, &b, 10, 0)];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 4, 1))
            .unwrap();
        let row_a = outcome.rows.iter().find(|r| r.team_key == a.team_key).unwrap();
        let row_b = outcome.rows.iter().find(|r| r.team_key == b.team_key).unwrap();
        assert!((row_a.offense_raw - 6.0).abs() < 1e-9);
        assert!((row_b.defense_raw - 6.0).abs() < 1e-9);
        // the unweighted goal tallies stay uncapped
        assert_eq!(row_a.goals_for, 10);
    }

    #[test]
    fn test_status_boundaries() {
        let active = roster_team("Alpha 2015", "az");
        let edge = roster_team("Bravo 2015", "az");
        let stale = roster_team("Charlie 2015", "az");
        let sparse = roster_team("Delta 2015", "az");
        let roster = vec![active.clone(), edge.clone(), stale.clone(), sparse.clone()];
        let today = date(2026, 7, 30);

        let mut matches = Vec::new();
        // five recent games: Active at exactly the games floor
        for i in 0..5 {
            matches.push(external_row(date(2026, 7, 1 + i), &active, &format!("Opp A{}", i), 1, 0));
        }
        // five games, the last exactly 180 days before today: still Active
        for i in 0..5 {
            matches.push(external_row(date(2026, 1, 27 + i), &edge, &format!("Opp B{}", i), 1, 0));
        }
        assert_eq!((today - date(2026, 1, 31)).num_days(), 180);
        // five games, the last 181 days back: Inactive
        for i in 0..5 {
            matches.push(external_row(date(2026, 1, 26 + i), &stale, &format!("Opp C{}", i), 1, 0));
        }
        assert_eq!((today - date(2026, 1, 30)).num_days(), 181);
        // four old games: Provisional beats Inactive
        for i in 0..4 {
            matches.push(external_row(date(2026, 1, 2 + i), &sparse, &format!("Opp D{}", i), 1, 0));
        }

        let outcome = engine().rank(&matches, &roster, None, None, today).unwrap();
        let status_of = |team: &RosterTeam| {
            outcome
                .rows
                .iter()
                .find(|r| r.team_key == team.team_key)
                .unwrap()
                .status
        };
        assert_eq!(status_of(&active), TeamStatus::Active);
        assert_eq!(status_of(&edge), TeamStatus::Active);
        assert_eq!(status_of(&stale), TeamStatus::Inactive);
        assert_eq!(status_of(&sparse), TeamStatus::Provisional);
    }

    #[test]
    fn test_teams_without_games_are_not_ranked() {
        let a = roster_team("Alpha 2015", "az");
        let b = roster_team("Bravo 2015", "az");
        let idle = roster_team("Idle 2015", "az");
        let roster = vec![a.clone(), b.clone(), idle.clone()];
        let matches = vec![gold_row(date(2026, 3, 1), &a, &b, 2, 1)];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 4, 1))
            .unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert!(outcome.rows.iter().all(|r| r.team_key != idle.team_key));
    }

    #[test]
    fn test_norms_bounded_and_adjusted_score_never_exceeds_raw() {
        let teams: Vec<RosterTeam> = (0..6)
            .map(|i| roster_team(&format!("Team {:02} 2015", i), "az"))
            .collect();
        let mut matches = Vec::new();
        let mut day = 0u32;
        for i in 0..teams.len() {
            for j in (i + 1)..teams.len() {
                day += 1;
                matches.push(gold_row(
                    date(2026, 1, 1) + Duration::days(day as i64),
                    &teams[i],
                    &teams[j],
                    (i as u32 * 2) % 5,
                    (j as u32) % 4,
                ));
            }
        }
        let outcome = engine()
            .rank(&matches, &teams, None, None, date(2026, 4, 1))
            .unwrap();
        assert_eq!(outcome.rows.len(), teams.len());
        for row in &outcome.rows {
            assert!((0.0..=1.0).contains(&row.offense_norm));
            assert!((0.0..=1.0).contains(&row.defense_norm));
            assert!((0.0..=1.0).contains(&row.sos_norm));
            assert!(row.power_score_adj <= row.power_score + 1e-12);
        }
        // ranks are 1..N in output order
        for (i, row) in outcome.rows.iter().enumerate() {
            assert_eq!(row.rank, (i + 1) as u32);
        }
    }

    #[test]
    fn test_window_excludes_old_matches() {
        let a = roster_team("Alpha 2015", "az");
        let b = roster_team("Bravo 2015", "az");
        let roster = vec![a.clone(), b.clone()];
        let matches = vec![
            gold_row(date(2024, 1, 10), &a, &b, 5, 0), // outside the window
            gold_row(date(2026, 3, 1), &a, &b, 1, 1),
        ];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 4, 1))
            .unwrap();
        let row_a = outcome.rows.iter().find(|r| r.team_key == a.team_key).unwrap();
        assert_eq!(row_a.games_played, 1);
        assert_eq!(row_a.ties, 1);
        assert_eq!(row_a.wins, 0);
    }

    #[test]
    fn test_cross_age_counters() {
        let x = roster_team("Xray 2015", "az");
        let y_older = roster_team("Yuma 2014", "az");
        let nv = roster_team("Nevada Wolves 2015", "nv");
        let roster = vec![x.clone(), nv.clone()];
        let older = vec![y_older.clone()];
        let matches = vec![
            gold_row(date(2026, 3, 1), &x, &y_older, 1, 0),
            gold_row(date(2026, 3, 8), &x, &nv, 2, 2),
        ];
        let outcome = engine()
            .rank(&matches, &roster, Some(&older), None, date(2026, 4, 1))
            .unwrap();
        let row = outcome.rows.iter().find(|r| r.team_key == x.team_key).unwrap();
        assert_eq!(row.games_played, 2);
        assert_eq!(row.cross_age_games, 1);
        assert!((row.cross_age_pct - 50.0).abs() < 1e-9);
        assert_eq!(row.cross_state_games, 1);
        assert!((row.cross_state_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_gold_rows_collapse() {
        let a = roster_team("Alpha 2015", "az");
        let b = roster_team("Bravo 2015", "az");
        let roster = vec![a.clone(), b.clone()];
        let row = gold_row(date(2026, 3, 1), &a, &b, 2, 1);
        let matches = vec![row.clone(), row];
        let outcome = engine()
            .rank(&matches, &roster, None, None, date(2026, 4, 1))
            .unwrap();
        let row_a = outcome.rows.iter().find(|r| r.team_key == a.team_key).unwrap();
        assert_eq!(row_a.games_played, 1);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let teams: Vec<RosterTeam> = (0..8)
            .map(|i| roster_team(&format!("Team {:02} 2015", i), "az"))
            .collect();
        let mut matches = Vec::new();
        for i in 0..teams.len() {
            for j in (i + 1)..teams.len() {
                matches.push(gold_row(
                    date(2026, 2, ((i * 3 + j) % 27 + 1) as u32),
                    &teams[i],
                    &teams[j],
                    ((i + 2 * j) % 6) as u32,
                    ((j + i) % 4) as u32,
                ));
            }
        }
        let first = engine()
            .rank(&matches, &teams, None, None, date(2026, 4, 1))
            .unwrap();
        let second = engine()
            .rank(&matches, &teams, None, None, date(2026, 4, 1))
            .unwrap();
        let a = serde_json::to_string(&first.rows).unwrap();
        let b = serde_json::to_string(&second.rows).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_roster_is_malformed() {
        let err = engine()
            .rank(&[], &[], None, None, date(2026, 4, 1))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }
}

