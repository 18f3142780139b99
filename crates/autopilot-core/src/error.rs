use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutopilotError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient market signals: {valid} strategies with valid APR, need at least 2")]
    InsufficientSignals { valid: usize },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AutopilotError {
    /// Short machine-readable kind, used in HTTP error bodies and CLI JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            AutopilotError::InvalidInput(_) => "invalid_input",
            AutopilotError::InsufficientSignals { .. } => "insufficient_signals",
            AutopilotError::UpstreamUnavailable(_) => "upstream_unavailable",
            AutopilotError::ExecutionFailed(_) => "execution_failed",
            AutopilotError::ConfigNotFound(_) => "config_not_found",
            AutopilotError::Io(_) | AutopilotError::Yaml(_) | AutopilotError::Json(_) => {
                "internal"
            }
        }
    }

    /// Whether a caller may retry the same request later and expect a different outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutopilotError::InsufficientSignals { .. } | AutopilotError::UpstreamUnavailable(_)
        )
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AutopilotError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AutopilotError>;
