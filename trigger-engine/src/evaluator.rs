//! Trigger evaluation
//!
//! Holds the pending rules of one series and runs them against every closed
//! bar, in registration order. Each rule pairs its immutable definition with
//! its own run-state, so rules sharing a series never share state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use trigger_core::{
    ClosedBar, Direction, ExecutionEvent, FirePolicy, Operand, OrderId, RuleDefinition,
    SubscriptionKey, TriggerEvent,
};

use crate::error::EvalError;

/// Mutable per-rule state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleRunState {
    pub last_fired_end_time: Option<i64>,
    pub consecutive_hits: u32,
}

/// A pending rule being evaluated
#[derive(Debug, Clone)]
pub struct RuntimeTrigger {
    pub rule: Arc<RuleDefinition>,
    pub state: RuleRunState,
}

impl RuntimeTrigger {
    pub fn new(rule: Arc<RuleDefinition>) -> Self {
        Self {
            rule,
            state: RuleRunState::default(),
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.rule.order_id
    }
}

/// What a single rule did on one bar
#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// Nothing to report; the rule stays pending
    Pending,
    /// The rule fired and stays pending (recurring)
    Fired(TriggerEvent),
    /// The rule is finished
    Done(TriggerEvent),
}

#[derive(Debug)]
pub struct TriggerEvaluator {
    key: SubscriptionKey,
    interval_ms: i64,
    triggers: Vec<RuntimeTrigger>,
}

impl TriggerEvaluator {
    pub fn new(key: SubscriptionKey) -> Self {
        let interval_ms = key.interval.to_millis();
        Self {
            key,
            interval_ms,
            triggers: Vec::new(),
        }
    }

    /// Add a rule; false if its order id is already pending here
    pub fn add(&mut self, rule: Arc<RuleDefinition>) -> bool {
        if self.contains(rule.order_id) {
            return false;
        }
        debug!("[Evaluator {}] Added order {}", self.key, rule.order_id);
        self.triggers.push(RuntimeTrigger::new(rule));
        true
    }

    pub fn remove(&mut self, order_id: OrderId) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|t| t.order_id() != order_id);
        before != self.triggers.len()
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.triggers.iter().any(|t| t.order_id() == order_id)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&RuntimeTrigger> {
        self.triggers.iter().find(|t| t.order_id() == order_id)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Drop rules whose lifetime ended by `now_ms`
    pub fn expire(&mut self, now_ms: i64) -> Vec<TriggerEvent> {
        let mut events = Vec::new();
        let key = &self.key;
        self.triggers.retain(|trigger| match expiry(trigger, now_ms) {
            Some(event) => {
                info!("[Evaluator {}] Order {} expired", key, trigger.order_id());
                events.push(event);
                false
            }
            None => true,
        });
        events
    }

    /// Run every pending rule against `closed`
    pub fn evaluate(&mut self, closed: &ClosedBar, now_ms: i64) -> Vec<TriggerEvent> {
        let mut events = Vec::new();
        let key = &self.key;
        let interval_ms = self.interval_ms;

        self.triggers.retain_mut(|trigger| {
            match evaluate_rule(trigger, closed, interval_ms, now_ms) {
                Ok(Step::Pending) => true,
                Ok(Step::Fired(event)) => {
                    info!("[Evaluator {}] Order {} fired (recurring)", key, trigger.order_id());
                    events.push(event);
                    true
                }
                Ok(Step::Done(event)) => {
                    info!(
                        "[Evaluator {}] Order {} resolved at bar {}: {:?}",
                        key,
                        trigger.order_id(),
                        closed.bar.end_time,
                        event
                    );
                    events.push(event);
                    false
                }
                Err(e) => {
                    warn!(
                        "[Evaluator {}] Order {} skipped on bar {}: {}",
                        key,
                        trigger.order_id(),
                        closed.bar.end_time,
                        e
                    );
                    true
                }
            }
        });

        events
    }
}

fn expiry(trigger: &RuntimeTrigger, now_ms: i64) -> Option<TriggerEvent> {
    let expires_at = trigger.rule.expires_at()?;
    (now_ms >= expires_at).then(|| TriggerEvent::Expired {
        order_id: trigger.order_id(),
        at_ms: now_ms,
    })
}

/// Current value of an operand on `closed`; `None` while unresolved
fn resolve(operand: &Operand, closed: &ClosedBar) -> Option<f64> {
    match operand {
        Operand::Literal { value } => Some(*value),
        Operand::Field { field } => Some(closed.bar.field(*field)),
        Operand::Indicator(reference) => closed
            .indicator(&reference.spec())
            .map(|output| output.line(reference.band)),
    }
}

fn finite(side: &'static str, value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFiniteOperand { side, value })
    }
}

fn evaluate_rule(
    trigger: &mut RuntimeTrigger,
    closed: &ClosedBar,
    interval_ms: i64,
    now_ms: i64,
) -> Result<Step, EvalError> {
    if let Some(event) = expiry(trigger, now_ms) {
        return Ok(Step::Done(event));
    }

    let rule = Arc::clone(&trigger.rule);
    let bar = &closed.bar;

    let (Some(lhs), Some(rhs)) = (resolve(&rule.lhs, closed), resolve(&rule.rhs, closed)) else {
        return Ok(Step::Pending);
    };
    let lhs = finite("lhs", lhs)?;
    let rhs = finite("rhs", rhs)?;

    let fired = rule.direction.holds(lhs, rhs);

    if rule.invalidation_halt && opposite_holds(rule.direction, lhs, rhs) {
        return Ok(Step::Done(TriggerEvent::Invalidated {
            order_id: rule.order_id,
            bar_end_time: bar.end_time,
            lhs,
            rhs,
        }));
    }

    let state = &mut trigger.state;

    let confirmed = match rule.confirmation {
        Some(confirmation) => {
            if fired {
                state.consecutive_hits = state.consecutive_hits.saturating_add(1);
            } else {
                state.consecutive_hits = 0;
            }
            state.consecutive_hits >= confirmation.required
        }
        None => true,
    };

    let cooled = match (rule.cooldown_bars, state.last_fired_end_time) {
        (Some(bars), Some(last)) if interval_ms > 0 => {
            (bar.end_time - last) / interval_ms >= i64::from(bars)
        }
        _ => true,
    };

    if !(fired && confirmed && cooled) {
        return Ok(Step::Pending);
    }

    state.last_fired_end_time = Some(bar.end_time);
    let event = TriggerEvent::Triggered(ExecutionEvent {
        order_id: rule.order_id,
        symbol: bar.symbol.clone(),
        interval: bar.interval,
        trigger_price: bar.close,
        bar_end_time: bar.end_time,
        lhs,
        rhs,
    });

    match rule.fire_policy {
        FirePolicy::OneShot => Ok(Step::Done(event)),
        FirePolicy::Recurring => {
            state.consecutive_hits = 0;
            Ok(Step::Fired(event))
        }
    }
}

fn opposite_holds(direction: Direction, lhs: f64, rhs: f64) -> bool {
    direction
        .opposite()
        .is_some_and(|opposite| opposite.holds(lhs, rhs))
}
