//! Upstream market feed boundary
//!
//! The engine only talks to the venue through these traits: a bulk
//! closed-bar request for warm-up, and a persistent candle stream.

use async_trait::async_trait;

use crate::error::FeedError;
use crate::market::{Bar, SubscriptionKey};

/// One inbound item from a live candle connection
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Snapshot of the current (possibly still open) bar
    Candle(Bar),
    /// Control traffic or a message for another channel
    Ignored,
    /// The upstream closed the connection cleanly
    Closed,
}

/// A live, subscribed candle stream for one series
#[async_trait]
pub trait CandleConnection: Send {
    async fn recv(&mut self) -> Result<FeedEvent, FeedError>;
}

/// The single upstream venue
#[async_trait]
pub trait MarketFeed: Send + Sync + 'static {
    /// Resolve a user-facing pair to the venue's canonical symbol
    fn canonical_symbol(&self, symbol: &str) -> String;

    /// Closed bars for `key` whose end time falls in `[start_ms, end_ms]`
    async fn fetch_closed_bars(
        &self,
        key: &SubscriptionKey,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, FeedError>;

    /// Open a connection and subscribe it to `key`
    async fn connect(&self, key: &SubscriptionKey) -> Result<Box<dyn CandleConnection>, FeedError>;
}
