use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    // Validation errors
    #[error("Address parameter is required")]
    MissingAddress,

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    // Inbound rate limiting
    #[error("Too many requests, retry in {retry_after_seconds}s")]
    ClientRateLimited {
        retry_after_seconds: u64,
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    // Upstream errors
    #[error("Upstream provider is rate limiting requests")]
    UpstreamRateLimited { retry_after_seconds: Option<u64> },

    #[error("Upstream request failed: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream returned a malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Upstream request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // System errors
    #[error("Dispatcher unavailable: {0}")]
    DispatcherClosed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExplorerError {
    /// Check if the dispatcher should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExplorerError::UpstreamRateLimited { .. }
                | ExplorerError::UpstreamUnavailable(_)
                | ExplorerError::MalformedPayload(_)
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            ExplorerError::MissingAddress | ExplorerError::InvalidAddress(_) => "validation",

            ExplorerError::ClientRateLimited { .. } => "rate_limit",

            ExplorerError::UpstreamRateLimited { .. }
            | ExplorerError::UpstreamUnavailable(_)
            | ExplorerError::MalformedPayload(_)
            | ExplorerError::RetriesExhausted { .. } => "upstream",

            _ => "system",
        }
    }
}

// Result type alias for convenience
pub type ExplorerResult<T> = Result<T, ExplorerError>;
