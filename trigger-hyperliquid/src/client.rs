//! Hyperliquid info API client
//!
//! Provides the bulk historical candle request used to warm up indicators.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use trigger_core::{Bar, CandleInterval, FeedError};

use crate::types::{CandleSnapshotRequest, HyperliquidCandle, HYPERLIQUID_INFO_URL};

/// Default per-request timeout for the info endpoint
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Hyperliquid REST client
#[derive(Clone)]
pub struct HyperliquidClient {
    client: Client,
    info_url: String,
}

impl HyperliquidClient {
    /// Create a client for the mainnet info endpoint
    pub fn new() -> Result<Self, FeedError> {
        Self::with_url(HYPERLIQUID_INFO_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client for a custom info endpoint
    pub fn with_url(info_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            info_url: info_url.to_string(),
        })
    }

    /// Get the info URL
    pub fn info_url(&self) -> &str {
        &self.info_url
    }

    /// Fetch candles for `coin` between `start_ms` and `end_ms`
    ///
    /// The venue returns the still-open bar as well; callers filter by end
    /// time.
    #[instrument(skip(self))]
    pub async fn candle_snapshot(
        &self,
        coin: &str,
        interval: CandleInterval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, FeedError> {
        let body = CandleSnapshotRequest::new(coin, interval, start_ms, end_ms);

        debug!("Fetching Hyperliquid candles for {}/{}", coin, interval);

        let response = self
            .client
            .post(&self.info_url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }

        let candles: Vec<HyperliquidCandle> = response
            .json()
            .await
            .map_err(|e| FeedError::parse(format!("Failed to parse candle snapshot: {}", e)))?;

        let mut bars = Vec::with_capacity(candles.len());
        for candle in candles {
            match candle.into_bar() {
                Ok(bar) => bars.push(bar),
                Err(e) => debug!("Skipping malformed snapshot candle: {}", e),
            }
        }

        Ok(bars)
    }
}

fn map_request_error(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Timeout
    } else if let Some(status) = e.status() {
        FeedError::from_status(status.as_u16(), e.to_string())
    } else {
        FeedError::network(format!("Failed to fetch candles: {}", e))
    }
}

impl std::fmt::Debug for HyperliquidClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidClient")
            .field("info_url", &self.info_url)
            .finish()
    }
}
