//! Market data types
//!
//! Candlestick bars as delivered by the venue, the scalar sources derived
//! from them, and the per-series subscription key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::indicator::{IndicatorOutput, IndicatorSpec};
use crate::interval::CandleInterval;

/// A single OHLCV bar
///
/// Times are epoch milliseconds. `end_time` is the inclusive close boundary
/// reported by the venue; a bar is considered closed once the wall clock
/// reaches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub interval: CandleInterval,
    pub start_time: i64,
    pub end_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

impl Bar {
    /// Read a raw OHLCV field
    pub fn field(&self, field: BarField) -> f64 {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => self.volume,
            BarField::Trades => self.trade_count as f64,
        }
    }

    /// Derive the scalar an indicator consumes from this bar
    pub fn source(&self, source: PriceSource) -> f64 {
        match source {
            PriceSource::Open => self.open,
            PriceSource::High => self.high,
            PriceSource::Low => self.low,
            PriceSource::Close => self.close,
            PriceSource::Hl2 => (self.high + self.low) / 2.0,
            PriceSource::Hlc3 => (self.high + self.low + self.close) / 3.0,
            PriceSource::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

/// Raw bar fields a rule may compare directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    #[serde(alias = "o")]
    Open,
    #[serde(alias = "h")]
    High,
    #[serde(alias = "l")]
    Low,
    #[serde(alias = "c")]
    Close,
    #[serde(alias = "v")]
    Volume,
    #[serde(alias = "n", alias = "trade_count")]
    Trades,
}

/// Scalar derived from a bar and fed into an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    /// (high + low) / 2
    Hl2,
    /// (high + low + close) / 3
    Hlc3,
    /// (open + high + low + close) / 4
    Ohlc4,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceSource::Open => "open",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Close => "close",
            PriceSource::Hl2 => "hl2",
            PriceSource::Hlc3 => "hlc3",
            PriceSource::Ohlc4 => "ohlc4",
        };
        f.write_str(name)
    }
}

/// Identifies one streamed series: canonical venue symbol plus interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub symbol: String,
    pub interval: CandleInterval,
}

impl SubscriptionKey {
    pub fn new(symbol: impl Into<String>, interval: CandleInterval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.interval)
    }
}

/// A finalized bar enriched with the indicator values computed on close
#[derive(Debug, Clone)]
pub struct ClosedBar {
    pub bar: Bar,
    pub indicators: HashMap<IndicatorSpec, IndicatorOutput>,
}

impl ClosedBar {
    /// Resolved output for `spec`, if it was configured and warmed up
    pub fn indicator(&self, spec: &IndicatorSpec) -> Option<IndicatorOutput> {
        self.indicators.get(spec).copied()
    }
}

impl fmt::Display for ClosedBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} t=[{}..{}] close={}",
            self.bar.symbol, self.bar.interval, self.bar.start_time, self.bar.end_time, self.bar.close
        )?;
        for (spec, output) in &self.indicators {
            match output {
                IndicatorOutput::Value(v) => write!(f, " {}={:.4}", spec, v)?,
                IndicatorOutput::Bands { upper, middle, lower } => write!(
                    f,
                    " {}=[{:.4} {:.4} {:.4}]",
                    spec, lower, middle, upper
                )?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar() -> Bar {
        Bar {
            symbol: "BTC".to_string(),
            interval: CandleInterval::OneMinute,
            start_time: 0,
            end_time: 59_999,
            open: 10.0,
            high: 14.0,
            low: 8.0,
            close: 12.0,
            volume: 3.5,
            trade_count: 7,
        }
    }

    #[test]
    fn test_source_blends() {
        let b = bar();
        assert_eq!(b.source(PriceSource::Close), 12.0);
        assert_eq!(b.source(PriceSource::Hl2), 11.0);
        assert!((b.source(PriceSource::Hlc3) - 34.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.source(PriceSource::Ohlc4), 11.0);
    }

    #[test]
    fn test_fields() {
        let b = bar();
        assert_eq!(b.field(BarField::Volume), 3.5);
        assert_eq!(b.field(BarField::Trades), 7.0);
    }

    #[test]
    fn test_field_aliases() {
        let field: BarField = serde_json::from_str("\"n\"").unwrap();
        assert_eq!(field, BarField::Trades);
        let field: BarField = serde_json::from_str("\"close\"").unwrap();
        assert_eq!(field, BarField::Close);
    }

    #[test]
    fn test_key_display() {
        let key = SubscriptionKey::new("ETH", CandleInterval::OneHour);
        assert_eq!(key.to_string(), "ETH/1h");
    }
}
