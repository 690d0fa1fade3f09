//! Streaming OHLCV trigger engine
//!
//! Turns a live candle feed into trigger decisions:
//! - `CandleFinalizer` closes bars by wall clock, exactly once each
//! - `IndicatorBank` keeps rolling SMA/EMA/RSI/Bollinger/VWAP state per series
//! - `HistorySeeder` warms indicators from recent closed bars
//! - `TriggerEvaluator` applies rule policies to every closed bar
//! - `TriggerEngine` deduplicates subscriptions and routes rules to them

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod finalizer;
pub mod indicators;
pub mod registry;
pub mod runner;
pub mod seeder;

pub use backoff::Backoff;
pub use config::{EngineConfig, SeedConfig};
pub use engine::TriggerEngine;
pub use error::{EngineError, EngineResult, EvalError};
pub use evaluator::{RuleRunState, RuntimeTrigger, TriggerEvaluator};
pub use finalizer::CandleFinalizer;
pub use indicators::IndicatorBank;
pub use registry::{ActiveTriggerIndex, SubscriptionRegistry};
pub use runner::{run_transport, WorkerCommand};
pub use seeder::HistorySeeder;
