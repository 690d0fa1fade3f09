//! Trigger engine
//!
//! Entry point for rule intake. Owns the shared registries and starts one
//! subscription worker per canonical series on demand.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use trigger_core::{CandleInterval, MarketFeed, OrderId, RuleDefinition, SubscriptionKey, TriggerEvent};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::{ActiveTriggerIndex, SubscriptionHandle, SubscriptionRegistry};
use crate::runner::{now_ms, SubscriptionWorker, WorkerCommand};

/// Streaming trigger engine
///
/// Cloning is cheap; clones share the same registries and event channel.
#[derive(Clone)]
pub struct TriggerEngine {
    config: EngineConfig,
    feed: Arc<dyn MarketFeed>,
    registry: Arc<SubscriptionRegistry>,
    active: Arc<ActiveTriggerIndex>,
    events: mpsc::UnboundedSender<TriggerEvent>,
}

impl TriggerEngine {
    /// Create an engine and the receiver its trigger events are delivered on
    pub fn new(
        config: EngineConfig,
        feed: Arc<dyn MarketFeed>,
    ) -> (Self, mpsc::UnboundedReceiver<TriggerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let engine = Self {
            config,
            feed,
            registry: Arc::new(SubscriptionRegistry::new()),
            active: Arc::new(ActiveTriggerIndex::new()),
            events,
        };
        (engine, events_rx)
    }

    /// Resolve a user-facing pair to its subscription key
    pub fn resolve(&self, pair: &str, interval: CandleInterval) -> EngineResult<SubscriptionKey> {
        let symbol = self.feed.canonical_symbol(pair);
        if symbol.is_empty() {
            return Err(EngineError::UnknownSymbol(pair.to_string()));
        }
        Ok(SubscriptionKey::new(symbol, interval))
    }

    /// Make sure a worker is streaming `pair`/`interval`
    pub fn ensure(&self, pair: &str, interval: CandleInterval) -> EngineResult<SubscriptionKey> {
        let key = self.resolve(pair, interval)?;
        self.ensure_key(&key);
        Ok(key)
    }

    fn ensure_key(&self, key: &SubscriptionKey) -> mpsc::UnboundedSender<WorkerCommand> {
        let (commands, _) = self.registry.ensure(key, || self.spawn_worker(key));
        commands
    }

    fn spawn_worker(&self, key: &SubscriptionKey) -> SubscriptionHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let worker = SubscriptionWorker::new(
            key.clone(),
            self.config.clone(),
            Arc::clone(&self.feed),
            Arc::clone(&self.active),
            self.events.clone(),
        );
        let task = tokio::spawn(worker.run(commands_rx));
        SubscriptionHandle::new(commands, task)
    }

    /// Advisory: streams are kept running
    pub fn release(&self, pair: &str, interval: CandleInterval) {
        if let Ok(key) = self.resolve(pair, interval) {
            self.registry.release(&key);
        }
    }

    /// Start evaluating `rule`.
    ///
    /// Registering an order id that is already pending is a no-op and returns
    /// the key it is pending on. A zero `created_at_ms` is stamped with the
    /// current time so lifetimes count from registration.
    pub fn register(&self, mut rule: RuleDefinition) -> EngineResult<SubscriptionKey> {
        rule.validate()?;

        let needed = rule.warmup_bars();
        let available = self.config.warmup_limit();
        if needed > available {
            return Err(EngineError::InsufficientHistory {
                order_id: rule.order_id,
                needed,
                available,
            });
        }

        let key = self.resolve(&rule.pair, rule.interval)?;
        if rule.created_at_ms == 0 {
            rule.created_at_ms = now_ms();
        }

        if !self.active.try_insert(rule.order_id, &key) {
            let existing = self.active.get(rule.order_id).unwrap_or(key);
            debug!("[Engine] Order {} already pending on {}", rule.order_id, existing);
            return Ok(existing);
        }

        let order_id = rule.order_id;
        let commands = self.ensure_key(&key);
        if commands.send(WorkerCommand::AddRule(Arc::new(rule))).is_err() {
            self.active.remove(order_id);
            warn!("[Engine] Worker for {} rejected order {}", key, order_id);
            return Err(EngineError::SubscriptionClosed(key));
        }

        info!("[Engine] Registered order {} on {}", order_id, key);
        Ok(key)
    }

    /// Drop a pending rule; false if the order was not pending
    pub fn cancel(&self, order_id: OrderId) -> bool {
        let Some(key) = self.active.remove(order_id) else {
            return false;
        };
        if !self.registry.send(&key, WorkerCommand::Cancel(order_id)) {
            warn!("[Engine] Could not reach worker for {} to cancel {}", key, order_id);
        }
        info!("[Engine] Cancelled order {} on {}", order_id, key);
        true
    }

    pub fn is_pending(&self, order_id: OrderId) -> bool {
        self.active.contains(order_id)
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionKey> {
        self.registry.keys()
    }

    /// Stop every subscription worker
    pub fn shutdown(&self) {
        info!(
            "[Engine] Shutting down {} subscriptions with {} pending orders",
            self.registry.len(),
            self.active.len()
        );
        self.registry.shutdown();
    }
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("subscriptions", &self.registry.len())
            .field("pending", &self.active.len())
            .finish()
    }
}
