//! Crate-wide error types and retry classification

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SummarizeError>;

/// Summarization errors
///
/// Upstream failures are split into transient classes (rate limit, overload,
/// transport) that the invoker may retry, and terminal classes that propagate
/// immediately.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("upstream rate limit hit")]
    RateLimited { retry_after: Option<u64> },

    #[error("upstream service overloaded: {0}")]
    Overloaded(String),

    #[error("upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("task timed out")]
    Timeout,

    #[error("all chunks failed processing")]
    AllChunksFailed,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SummarizeError {
    /// Whether the invoker may retry this failure with backoff.
    ///
    /// Rate limits (429), overload (503/529) and transport-level failures are
    /// transient; everything else is terminal and must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SummarizeError::RateLimited { .. }
                | SummarizeError::Overloaded(_)
                | SummarizeError::Request(_)
        )
    }

    /// Upstream retry-after hint in seconds, if one was provided.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            SummarizeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
