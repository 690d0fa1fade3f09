//! Rule definitions submitted by the rule intake
//!
//! A rule compares two operands on every closed bar of its series and,
//! subject to its policies, marks the owning order as triggered.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::indicator::{IndicatorKind, IndicatorRef, IndicatorSpec};
use crate::interval::CandleInterval;
use crate::market::BarField;

/// Identifier of the order a rule belongs to
pub type OrderId = u64;

/// Upper bound on indicator lengths; matches the default seeded history
pub const MAX_INDICATOR_LENGTH: usize = 1000;

const DEFAULT_CONFIRMATIONS: u32 = 2;

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operand {
    /// Constant value
    Literal { value: f64 },
    /// Raw field of the closed bar
    #[serde(alias = "source")]
    Field { field: BarField },
    /// Latest value of an indicator on the rule's series
    Indicator(IndicatorRef),
}

impl Operand {
    pub fn indicator_spec(&self) -> Option<IndicatorSpec> {
        match self {
            Operand::Indicator(r) => Some(r.spec()),
            Operand::Literal { .. } | Operand::Field { .. } => None,
        }
    }
}

/// Absolute tolerance of [`Direction::Equals`]
pub const EQUALS_TOLERANCE: f64 = 1e-4;

/// Comparison direction between `lhs` and `rhs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Above,
    Below,
    Equals,
}

impl Direction {
    /// `Above` and `Below` are strict; `Equals` allows [`EQUALS_TOLERANCE`]
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Direction::Above => lhs > rhs,
            Direction::Below => lhs < rhs,
            Direction::Equals => (lhs - rhs).abs() < EQUALS_TOLERANCE,
        }
    }

    /// `Equals` has no opposite, so it is never invalidated
    pub fn opposite(self) -> Option<Self> {
        match self {
            Direction::Above => Some(Direction::Below),
            Direction::Below => Some(Direction::Above),
            Direction::Equals => None,
        }
    }
}

/// Consecutive-hit confirmation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default = "default_confirmations")]
    pub required: u32,
}

fn default_confirmations() -> u32 {
    DEFAULT_CONFIRMATIONS
}

/// What happens to a rule after it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirePolicy {
    /// Removed after the first fire
    #[default]
    OneShot,
    /// Stays active; cooldown governs re-firing
    Recurring,
}

/// Immutable rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub order_id: OrderId,
    /// User-facing pair, resolved to the venue symbol at registration
    pub pair: String,
    pub interval: CandleInterval,
    pub lhs: Operand,
    pub direction: Direction,
    pub rhs: Operand,
    /// Minimum bars between fires
    #[serde(default)]
    pub cooldown_bars: Option<u32>,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
    /// Discard the rule if the opposite comparison is observed first
    #[serde(default)]
    pub invalidation_halt: bool,
    #[serde(default)]
    pub fire_policy: FirePolicy,
    #[serde(default)]
    pub lifetime_ms: Option<i64>,
    #[serde(default)]
    pub created_at_ms: i64,
}

impl RuleDefinition {
    /// Reject definitions that could never evaluate
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.pair.trim().is_empty() {
            return Err(RuleError::EmptyPair);
        }
        for operand in [&self.lhs, &self.rhs] {
            match operand {
                Operand::Literal { value } if !value.is_finite() => {
                    return Err(RuleError::NonFiniteLiteral(*value));
                }
                Operand::Indicator(r) => {
                    if r.length == 0 || r.length > MAX_INDICATOR_LENGTH {
                        return Err(RuleError::InvalidLength {
                            length: r.length,
                            max: MAX_INDICATOR_LENGTH,
                        });
                    }
                    if r.kind == IndicatorKind::Bollinger {
                        if let Some(k) = r.std_dev {
                            if !k.is_finite() || k <= 0.0 {
                                return Err(RuleError::InvalidMultiplier(k));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(c) = self.confirmation {
            if c.required == 0 {
                return Err(RuleError::InvalidConfirmation);
            }
        }
        if let Some(lifetime) = self.lifetime_ms {
            if lifetime <= 0 {
                return Err(RuleError::InvalidLifetime(lifetime));
            }
        }
        Ok(())
    }

    /// Indicator specs this rule reads
    pub fn indicator_specs(&self) -> impl Iterator<Item = IndicatorSpec> + '_ {
        [&self.lhs, &self.rhs]
            .into_iter()
            .filter_map(|operand| operand.indicator_spec())
    }

    /// Closed bars the slowest referenced indicator needs before it resolves
    pub fn warmup_bars(&self) -> usize {
        self.indicator_specs()
            .map(|spec| spec.warmup_bars())
            .max()
            .unwrap_or(0)
    }

    /// Epoch millis after which the rule expires unfired
    pub fn expires_at(&self) -> Option<i64> {
        self.lifetime_ms
            .map(|lifetime| self.created_at_ms.saturating_add(lifetime))
    }
}
