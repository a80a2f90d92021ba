use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// A structurally required input was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The simulation was stopped by its cancellation token or deadline.
    #[error("simulation cancelled after {completed_trials} trials")]
    Cancelled { completed_trials: usize },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScoutError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
