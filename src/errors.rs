/// Error taxonomy for the scrape/dump/reconstruct pipeline.
///
/// The relational core treats individual records as independent units of
/// work: `InputParse`, `Database`, `DbInvariant` and `RunCollision` abort a
/// single record, while sink- and cycle-level failures (`Sink`,
/// `SourceHttp`) abort a batch or a poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to parse input: {0}")]
    InputParse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database invariant violated: {0}")]
    DbInvariant(String),

    #[error("run record already exists: {0}")]
    RunCollision(String),

    #[error("sink failure: {0}")]
    Sink(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("feed returned HTTP {0}")]
    SourceHttp(reqwest::StatusCode),

    #[error("feed request failed: {0}")]
    SourceRequest(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no {kind} match for name `{name}`")]
    AliasNotFound { kind: String, name: String },

    #[error("circuit breaker: {0}")]
    Breaker(#[from] crate::services::breaker::BreakerError),
}

impl AppError {
    /// Wrap any error as a sink failure with context.
    pub fn sink(context: &str, err: impl std::fmt::Display) -> Self {
        AppError::Sink(format!("{}: {}", context, err))
    }
}
