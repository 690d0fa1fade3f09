//! Events emitted by the trigger engine towards the order collaborator

use serde::Serialize;

use crate::interval::CandleInterval;
use crate::rule::OrderId;

/// Payload delivered when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    pub order_id: OrderId,
    pub symbol: String,
    pub interval: CandleInterval,
    /// Close of the bar that fired the rule
    pub trigger_price: f64,
    pub bar_end_time: i64,
    pub lhs: f64,
    pub rhs: f64,
}

/// Terminal outcome of a pending rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// The rule fired; the order should execute
    Triggered(ExecutionEvent),
    /// The opposite condition was observed first; the rule was discarded
    Invalidated {
        order_id: OrderId,
        bar_end_time: i64,
        lhs: f64,
        rhs: f64,
    },
    /// The rule's lifetime ran out before it fired
    Expired { order_id: OrderId, at_ms: i64 },
}

impl TriggerEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            TriggerEvent::Triggered(e) => e.order_id,
            TriggerEvent::Invalidated { order_id, .. } | TriggerEvent::Expired { order_id, .. } => {
                *order_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_triggered() {
        let event = TriggerEvent::Triggered(ExecutionEvent {
            order_id: 9,
            symbol: "BTC".to_string(),
            interval: CandleInterval::FiveMinutes,
            trigger_price: 101.5,
            bar_end_time: 1_000,
            lhs: 101.5,
            rhs: 100.0,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "triggered");
        assert_eq!(json["order_id"], 9);
        assert_eq!(json["interval"], "5m");
        assert_eq!(event.order_id(), 9);
    }

    #[test]
    fn test_serialize_expired() {
        let event = TriggerEvent::Expired {
            order_id: 3,
            at_ms: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "expired");
        assert_eq!(json["at_ms"], 42);
    }
}
