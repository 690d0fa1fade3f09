//! `MarketFeed` implementation backed by Hyperliquid

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use trigger_core::{Bar, CandleConnection, FeedError, MarketFeed, SubscriptionKey};

use crate::client::{HyperliquidClient, DEFAULT_REQUEST_TIMEOUT};
use crate::symbols::SymbolResolver;
use crate::types::{HYPERLIQUID_INFO_URL, HYPERLIQUID_WS_URL};
use crate::websocket::{HyperliquidCandleConnection, PING_INTERVAL};

/// Configuration for HyperliquidFeed
#[derive(Clone, Debug)]
pub struct HyperliquidFeedConfig {
    pub ws_url: String,
    pub info_url: String,
    pub request_timeout: Duration,
    pub ping_interval: Duration,
    pub resolver: SymbolResolver,
}

impl Default for HyperliquidFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: HYPERLIQUID_WS_URL.to_string(),
            info_url: HYPERLIQUID_INFO_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ping_interval: PING_INTERVAL,
            resolver: SymbolResolver::new(),
        }
    }
}

/// Hyperliquid candle feed
#[derive(Debug, Clone)]
pub struct HyperliquidFeed {
    client: HyperliquidClient,
    ws_url: String,
    ping_interval: Duration,
    resolver: SymbolResolver,
}

impl HyperliquidFeed {
    pub fn new(config: HyperliquidFeedConfig) -> Result<Self, FeedError> {
        Url::parse(&config.ws_url)
            .map_err(|e| FeedError::parse(format!("Invalid WebSocket URL {}: {}", config.ws_url, e)))?;
        let client = HyperliquidClient::with_url(&config.info_url, config.request_timeout)?;

        Ok(Self {
            client,
            ws_url: config.ws_url,
            ping_interval: config.ping_interval,
            resolver: config.resolver,
        })
    }

    pub fn client(&self) -> &HyperliquidClient {
        &self.client
    }
}

#[async_trait]
impl MarketFeed for HyperliquidFeed {
    fn canonical_symbol(&self, symbol: &str) -> String {
        self.resolver.canonicalize(symbol)
    }

    async fn fetch_closed_bars(
        &self,
        key: &SubscriptionKey,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, FeedError> {
        self.client
            .candle_snapshot(&key.symbol, key.interval, start_ms, end_ms)
            .await
    }

    async fn connect(&self, key: &SubscriptionKey) -> Result<Box<dyn CandleConnection>, FeedError> {
        let connection =
            HyperliquidCandleConnection::connect(&self.ws_url, key, self.ping_interval).await?;
        Ok(Box::new(connection))
    }
}
