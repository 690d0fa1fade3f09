//! Error types for the trigger engine

use thiserror::Error;

use trigger_core::{FeedError, OrderId, RuleError, SubscriptionKey};

/// Errors returned by the engine's public API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Pair {0:?} does not resolve to a venue symbol")]
    UnknownSymbol(String),

    #[error("Order {order_id} needs {needed} bars of history; only {available} are kept")]
    InsufficientHistory {
        order_id: OrderId,
        needed: usize,
        available: usize,
    },

    #[error("Subscription {0} is no longer running")]
    SubscriptionClosed(SubscriptionKey),

    #[error("History seeding for {key} failed after {attempts} attempt(s): {source}")]
    SeedFailed {
        key: SubscriptionKey,
        attempts: u32,
        #[source]
        source: FeedError,
    },
}

/// Why a single rule could not be evaluated against a bar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{side} operand is not finite ({value})")]
    NonFiniteOperand { side: &'static str, value: f64 },
}

pub type EngineResult<T> = Result<T, EngineError>;
