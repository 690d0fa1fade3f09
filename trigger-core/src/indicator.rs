//! Indicator identities and outputs
//!
//! `IndicatorSpec` is the identity of one accumulator inside a series'
//! indicator bank: two rules referencing the same spec share its state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::market::PriceSource;

/// Default Bollinger band multiplier
pub const DEFAULT_BAND_MULTIPLIER: f64 = 2.0;

/// Indicator families a rule may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    #[serde(alias = "ma")]
    Sma,
    Ema,
    Rsi,
    #[serde(alias = "bb", alias = "bands")]
    Bollinger,
    Vwap,
}

/// Which line of a band indicator an operand reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandLine {
    Upper,
    #[default]
    #[serde(alias = "mid")]
    Middle,
    Lower,
}

/// Fully-resolved accumulator identity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorSpec {
    Sma { length: usize, source: PriceSource },
    Ema { length: usize, source: PriceSource },
    Rsi { length: usize, source: PriceSource },
    Bollinger { length: usize, source: PriceSource, multiplier: f64 },
    Vwap { length: usize, source: PriceSource },
}

impl IndicatorSpec {
    pub fn length(&self) -> usize {
        match *self {
            IndicatorSpec::Sma { length, .. }
            | IndicatorSpec::Ema { length, .. }
            | IndicatorSpec::Rsi { length, .. }
            | IndicatorSpec::Bollinger { length, .. }
            | IndicatorSpec::Vwap { length, .. } => length,
        }
    }

    pub fn source(&self) -> PriceSource {
        match *self {
            IndicatorSpec::Sma { source, .. }
            | IndicatorSpec::Ema { source, .. }
            | IndicatorSpec::Rsi { source, .. }
            | IndicatorSpec::Bollinger { source, .. }
            | IndicatorSpec::Vwap { source, .. } => source,
        }
    }

    /// Closed bars needed before the indicator resolves
    pub fn warmup_bars(&self) -> usize {
        match *self {
            IndicatorSpec::Ema { .. } | IndicatorSpec::Vwap { .. } => 1,
            IndicatorSpec::Rsi { length, .. } => length + 1,
            IndicatorSpec::Sma { length, .. } | IndicatorSpec::Bollinger { length, .. } => length,
        }
    }
}

// Multipliers are compared bitwise so specs can key a map.
impl Eq for IndicatorSpec {}

impl Hash for IndicatorSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.length().hash(state);
        self.source().hash(state);
        if let IndicatorSpec::Bollinger { multiplier, .. } = self {
            multiplier.to_bits().hash(state);
        }
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorSpec::Sma { length, source } => write!(f, "sma_{}_{}", length, source),
            IndicatorSpec::Ema { length, source } => write!(f, "ema_{}_{}", length, source),
            IndicatorSpec::Rsi { length, source } => write!(f, "rsi_{}_{}", length, source),
            IndicatorSpec::Bollinger {
                length,
                source,
                multiplier,
            } => write!(f, "bb_{}_{}_{}", length, multiplier, source),
            IndicatorSpec::Vwap { length, source } => write!(f, "vwap_{}_{}", length, source),
        }
    }
}

/// Indicator reference as it appears inside a rule operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRef {
    pub kind: IndicatorKind,
    pub length: usize,
    /// Defaults to close, or hlc3 for VWAP
    #[serde(default, alias = "OHLC_source")]
    pub source: Option<PriceSource>,
    /// Band multiplier; Bollinger only
    #[serde(default)]
    pub std_dev: Option<f64>,
    /// Band line to read; Bollinger only
    #[serde(default)]
    pub band: BandLine,
}

impl IndicatorRef {
    pub fn spec(&self) -> IndicatorSpec {
        let length = self.length;
        match self.kind {
            IndicatorKind::Sma => IndicatorSpec::Sma {
                length,
                source: self.source.unwrap_or_default(),
            },
            IndicatorKind::Ema => IndicatorSpec::Ema {
                length,
                source: self.source.unwrap_or_default(),
            },
            IndicatorKind::Rsi => IndicatorSpec::Rsi {
                length,
                source: self.source.unwrap_or_default(),
            },
            IndicatorKind::Bollinger => IndicatorSpec::Bollinger {
                length,
                source: self.source.unwrap_or_default(),
                multiplier: self.std_dev.unwrap_or(DEFAULT_BAND_MULTIPLIER),
            },
            IndicatorKind::Vwap => IndicatorSpec::Vwap {
                length,
                source: self.source.unwrap_or(PriceSource::Hlc3),
            },
        }
    }
}

/// Value produced by an accumulator for one closed bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorOutput {
    Value(f64),
    Bands { upper: f64, middle: f64, lower: f64 },
}

impl IndicatorOutput {
    /// Read the requested line; single-valued outputs ignore `band`
    pub fn line(&self, band: BandLine) -> f64 {
        match (*self, band) {
            (IndicatorOutput::Value(v), _) => v,
            (IndicatorOutput::Bands { upper, .. }, BandLine::Upper) => upper,
            (IndicatorOutput::Bands { middle, .. }, BandLine::Middle) => middle,
            (IndicatorOutput::Bands { lower, .. }, BandLine::Lower) => lower,
        }
    }
}
