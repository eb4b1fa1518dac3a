//! Error types for Threadloom
//!
//! A single crate-wide error enum covers validation failures, provider
//! failures (fatal and rate-limited), tool failures, cancellation and
//! persistence problems.

use thiserror::Error;

/// The main error type for Threadloom operations.
#[derive(Error, Debug)]
pub enum LoomError {
    /// Invalid caller input (empty text, bad ids, bad config values)
    #[error("validation error: {0}")]
    Validation(String),

    /// No thread registered under the given id
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// Regenerate was requested on a thread without any user message
    #[error("no user message found to regenerate from")]
    NoUserMessage,

    /// Non-system message index outside the conversation log
    #[error("invalid message index: {0}")]
    InvalidMessageIndex(usize),

    /// A stream request is already in flight for this agent
    #[error("agent is busy with another request: {0}")]
    AgentBusy(String),

    /// Provider signalled a 429-class rate limit; retried by the agent loop
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other provider failure; fatal to the current turn
    #[error("provider error: {0}")]
    Provider(String),

    /// Tool lookup or execution failure
    #[error("{0}")]
    Tool(String),

    /// The active stream was cancelled
    #[error("agent generation cancelled")]
    Cancelled,

    /// Persistence adapter failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration problem
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoomError {
    /// Whether this error is the transient rate-limit condition that the
    /// agent loop retries with a fixed backoff.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LoomError::RateLimited(_))
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, LoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(LoomError::RateLimited("429 Too Many Requests".into()).is_rate_limit());
        assert!(!LoomError::Provider("429 in body text".into()).is_rate_limit());
        assert!(!LoomError::Cancelled.is_rate_limit());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            LoomError::ThreadNotFound("t1".into()).to_string(),
            "thread not found: t1"
        );
        assert_eq!(
            LoomError::Cancelled.to_string(),
            "agent generation cancelled"
        );
        assert_eq!(
            LoomError::Tool("agent tool not found: nope".into()).to_string(),
            "agent tool not found: nope"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LoomError = io.into();
        assert!(matches!(err, LoomError::Io(_)));
    }
}
