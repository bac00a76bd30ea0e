use std::env;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = concat!("pitchrank/", env!("CARGO_PKG_VERSION"));

/// Tuning for the two-stage scraping pipeline.
///
/// Defaults match polite-scraping expectations of the upstream platform;
/// `HTTP_USER_AGENT` and `MAX_WORKERS` environment variables override the
/// corresponding fields.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub workers: usize,
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Backoff schedule is `backoff_base * 2^(attempt-1)`: 2s, 4s, 8s.
    pub backoff_base: Duration,
    /// Jittered inter-request delay, drawn uniformly per worker.
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Fraction of failed teams above which the division run fails.
    pub failure_threshold: f64,
    /// Months of match history retained in the gold table.
    pub history_months: u32,
    pub user_agent: String,
    /// Demotes `EmptyUpstream` to a warning.
    pub allow_empty: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            delay_min: Duration::from_millis(1500),
            delay_max: Duration::from_millis(3500),
            failure_threshold: 0.10,
            history_months: 18,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_empty: false,
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(agent) = env::var("HTTP_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        if let Ok(workers) = env::var("MAX_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) if n > 0 => config.workers = n,
                _ => tracing::warn!("Ignoring invalid MAX_WORKERS value: {}", workers),
            }
        }
        config
    }
}

/// All tuning constants of the rating computation, gathered in one place and
/// passed explicitly into the engine.
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Ranking window in days, relative to the newest match in the input.
    pub window_days: i64,
    /// Most recent views retained per team.
    pub max_views: usize,
    /// Goals above this cap do not move offense/defense accumulation.
    pub score_cap: u32,
    /// Weight mass for view ranks 1-10, 11-25 and 26-30.
    pub segment_mass: [f64; 3],
    pub segment_bounds: [usize; 3],
    /// Logistic steepness for expected score.
    pub k: f64,
    pub eta_base: f64,
    /// Rating-gap damping exponent.
    pub alpha: f64,
    /// Low-sample damping exponent.
    pub beta: f64,
    pub margin_step: f64,
    pub margin_clamp: (f64, f64),
    pub cross_age_multiplier: f64,
    pub default_opponent_strength: f64,
    pub max_iterations: u32,
    pub convergence_threshold: f64,
    /// Standard-deviation scale of the logistic normalization.
    pub sigma_scale: f64,
    /// Opponent-rating clip width for the SOS outlier guard.
    pub clip_sigmas: f64,
    pub offense_weight: f64,
    pub defense_weight: f64,
    pub sos_weight: f64,
    pub games_penalty_cap: u32,
    pub active_min_games: u32,
    pub inactive_after_days: i64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            window_days: 365,
            max_views: 30,
            score_cap: 6,
            segment_mass: [0.60, 0.30, 0.10],
            segment_bounds: [10, 25, 30],
            k: 4.0,
            eta_base: 0.05,
            alpha: 0.5,
            beta: 0.6,
            margin_step: 0.1,
            margin_clamp: (0.4, 1.6),
            cross_age_multiplier: 1.05,
            default_opponent_strength: 0.35,
            max_iterations: 10,
            convergence_threshold: 0.01,
            sigma_scale: 1.5,
            clip_sigmas: 2.5,
            offense_weight: 0.20,
            defense_weight: 0.20,
            sos_weight: 0.60,
            games_penalty_cap: 20,
            active_min_games: 5,
            inactive_after_days: 180,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_defaults() {
        let config = ScrapeConfig::default();
        assert_eq!(config.workers, 6);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 3);
        assert!((config.failure_threshold - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_rank_weights_sum_to_one() {
        let config = RankConfig::default();
        let total = config.offense_weight + config.defense_weight + config.sos_weight;
        assert!((total - 1.0).abs() < 1e-12);
        let mass: f64 = config.segment_mass.iter().sum();
        assert!((mass - 1.0).abs() < 1e-12);
    }
}
