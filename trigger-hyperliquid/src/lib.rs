//! Hyperliquid integration for the OHLCV trigger engine
//!
//! This crate provides the venue side of the candle pipeline:
//! - `HyperliquidClient` for the `candleSnapshot` info request
//! - `HyperliquidCandleConnection` for the live `candle` channel
//! - `SymbolResolver` for mapping user-facing pairs to venue coins
//! - `HyperliquidFeed`, which bundles them behind `trigger_core::MarketFeed`

pub mod client;
pub mod feed;
pub mod symbols;
pub mod types;
pub mod websocket;

pub use client::HyperliquidClient;
pub use feed::{HyperliquidFeed, HyperliquidFeedConfig};
pub use symbols::SymbolResolver;
pub use types::{HyperliquidCandle, HYPERLIQUID_INFO_URL, HYPERLIQUID_WS_URL};
pub use websocket::HyperliquidCandleConnection;
