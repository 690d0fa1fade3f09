//! Core types for the OHLCV trigger engine
//!
//! This crate defines the shared data structures used across the workspace:
//! bars and intervals, indicator identities, rule definitions, the events
//! emitted when rules resolve, and the upstream feed boundary.

pub mod error;
pub mod event;
pub mod feed;
pub mod indicator;
pub mod interval;
pub mod market;
pub mod rule;

pub use error::{FeedError, FeedResult, RuleError};
pub use event::{ExecutionEvent, TriggerEvent};
pub use feed::{CandleConnection, FeedEvent, MarketFeed};
pub use indicator::{BandLine, IndicatorKind, IndicatorOutput, IndicatorRef, IndicatorSpec};
pub use interval::CandleInterval;
pub use market::{Bar, BarField, ClosedBar, PriceSource, SubscriptionKey};
pub use rule::{
    Confirmation, Direction, FirePolicy, Operand, OrderId, RuleDefinition, EQUALS_TOLERANCE,
    MAX_INDICATOR_LENGTH,
};
