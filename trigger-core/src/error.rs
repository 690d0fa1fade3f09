//! Error types for the trigger engine

use thiserror::Error;

/// Errors raised while talking to the upstream market feed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Upstream server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Upstream rejected request ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Connection closed: {0}")]
    Closed(String),
}

impl FeedError {
    pub fn network(msg: impl Into<String>) -> Self {
        FeedError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FeedError::Parse(msg.into())
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        FeedError::Closed(msg.into())
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 => FeedError::RateLimited,
            500..=599 => FeedError::Server {
                status,
                message: message.into(),
            },
            _ => FeedError::Client {
                status,
                message: message.into(),
            },
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits, 5xx responses, dropped connections and timeouts are
    /// transient. Client errors and unparseable payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::RateLimited
                | FeedError::Server { .. }
                | FeedError::Network(_)
                | FeedError::Timeout
                | FeedError::Closed(_)
        )
    }
}

/// Reasons a rule definition is rejected at intake
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Pair must not be empty")]
    EmptyPair,

    #[error("Indicator length must be between 1 and {max}, got {length}")]
    InvalidLength { length: usize, max: usize },

    #[error("Band multiplier must be finite and positive, got {0}")]
    InvalidMultiplier(f64),

    #[error("Literal operand must be finite, got {0}")]
    NonFiniteLiteral(f64),

    #[error("Chained confirmation requires at least one hit")]
    InvalidConfirmation,

    #[error("Lifetime must be positive, got {0}ms")]
    InvalidLifetime(i64),
}

/// Result type alias for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
