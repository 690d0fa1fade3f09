//! Hyperliquid wire types
//!
//! These mirror the venue's candle payloads and requests. Candles arrive
//! with prices and volume as decimal strings and are converted to
//! trigger-core `Bar`s.

use serde::{Deserialize, Deserializer, Serialize};

use trigger_core::{Bar, CandleInterval, FeedError};

/// Mainnet WebSocket endpoint
pub const HYPERLIQUID_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";

/// Mainnet info endpoint (REST)
pub const HYPERLIQUID_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// Candle as sent on the `candle` channel and by `candleSnapshot`
#[derive(Debug, Clone, Deserialize)]
pub struct HyperliquidCandle {
    /// Open time (ms)
    #[serde(rename = "t")]
    pub start_time: i64,
    /// Close time (ms)
    #[serde(rename = "T")]
    pub end_time: i64,
    #[serde(rename = "s")]
    pub coin: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", deserialize_with = "de_number")]
    pub open: f64,
    #[serde(rename = "c", deserialize_with = "de_number")]
    pub close: f64,
    #[serde(rename = "h", deserialize_with = "de_number")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "de_number")]
    pub low: f64,
    #[serde(rename = "v", deserialize_with = "de_number")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: u64,
}

impl HyperliquidCandle {
    pub fn into_bar(self) -> Result<Bar, FeedError> {
        let interval: CandleInterval = self.interval.parse().map_err(FeedError::parse)?;

        Ok(Bar {
            symbol: self.coin,
            interval,
            start_time: self.start_time,
            end_time: self.end_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
        })
    }
}

/// Accept both `"123.4"` and `123.4`
fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Text(String),
        Float(f64),
    }

    match Number::deserialize(deserializer)? {
        Number::Float(v) => Ok(v),
        Number::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

/// Envelope of every WebSocket push
#[derive(Debug, Clone, Deserialize)]
pub struct WsEnvelope {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Outgoing WebSocket request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum WsRequest {
    Subscribe { subscription: CandleSubscription },
    Ping,
}

/// Candle channel subscription
#[derive(Debug, Clone, Serialize)]
pub struct CandleSubscription {
    #[serde(rename = "type")]
    pub sub_type: &'static str,
    pub coin: String,
    pub interval: String,
}

impl CandleSubscription {
    pub fn new(coin: &str, interval: CandleInterval) -> Self {
        Self {
            sub_type: "candle",
            coin: coin.to_string(),
            interval: interval.as_str().to_string(),
        }
    }
}

/// Body of `POST /info` for a historical candle range
#[derive(Debug, Clone, Serialize)]
pub struct CandleSnapshotRequest {
    #[serde(rename = "type")]
    pub req_type: &'static str,
    pub req: CandleSnapshotParams,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotParams {
    pub coin: String,
    pub interval: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl CandleSnapshotRequest {
    pub fn new(coin: &str, interval: CandleInterval, start_time: i64, end_time: i64) -> Self {
        Self {
            req_type: "candleSnapshot",
            req: CandleSnapshotParams {
                coin: coin.to_string(),
                interval: interval.as_str().to_string(),
                start_time,
                end_time,
            },
        }
    }
}
