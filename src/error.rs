use thiserror::Error;

/// Error taxonomy for the scraping pipeline and ranking engine.
///
/// Per-team faults during a scrape are isolated and recorded in the division
/// error log; only the variants below cross the component boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown division '{0}'")]
    UnknownDivision(String),

    #[error("upstream returned zero teams for division '{0}'")]
    EmptyUpstream(String),

    #[error("transient upstream error: {0}")]
    TransientHttp(String),

    #[error("rate limited by upstream ({0})")]
    RateLimited(String),

    #[error("no upstream profile found for team '{0}'")]
    ProfileNotFound(String),

    #[error("match row rejected: {0}")]
    MatchSchemaInvalid(String),

    #[error("{failed} of {attempted} teams failed, exceeding the {limit_pct:.0}% limit")]
    ThresholdExceeded {
        failed: usize,
        attempted: usize,
        limit_pct: f64,
    },

    #[error("malformed input file {path}: {reason}")]
    MalformedInput { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Process exit code for the CLI. Invalid arguments (2) are handled by
    /// clap before any of these are constructed.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::UnknownDivision(_) => 3,
            PipelineError::ThresholdExceeded { .. } => 4,
            PipelineError::MalformedInput { .. } => 5,
            _ => 1,
        }
    }

    /// Transient errors are retried with exponential backoff; everything else
    /// fails the attempt immediately.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientHttp(_) | PipelineError::RateLimited(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
