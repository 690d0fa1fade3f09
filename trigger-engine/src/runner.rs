//! Stream runner
//!
//! Each subscription is served by one worker task that owns its finalizer,
//! indicator bank and evaluator. The worker spawns a transport task that
//! keeps a venue connection alive and forwards candle snapshots over a
//! bounded channel. A watchdog tick inside the worker's select loop closes
//! bars even when the venue goes quiet at a boundary.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use trigger_core::{Bar, FeedEvent, MarketFeed, OrderId, RuleDefinition, SubscriptionKey, TriggerEvent};

use crate::backoff::Backoff;
use crate::config::EngineConfig;
use crate::evaluator::TriggerEvaluator;
use crate::finalizer::CandleFinalizer;
use crate::registry::ActiveTriggerIndex;
use crate::seeder::HistorySeeder;

/// Wall clock in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Instructions delivered to a subscription worker
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    AddRule(Arc<RuleDefinition>),
    Cancel(OrderId),
}

/// Aborts the wrapped task when dropped
#[derive(Debug)]
pub struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Keep a candle connection for `key` alive, forwarding snapshots to `tx`.
///
/// Reconnects forever with `backoff`; a successful connect resets it.
/// Returns once the receiving side is gone.
pub async fn run_transport(
    feed: Arc<dyn MarketFeed>,
    key: SubscriptionKey,
    tx: mpsc::Sender<Bar>,
    mut backoff: Backoff,
) {
    loop {
        match feed.connect(&key).await {
            Ok(mut connection) => {
                backoff.reset();
                info!("[Stream {}] Connected", key);

                loop {
                    match connection.recv().await {
                        Ok(FeedEvent::Candle(bar)) => {
                            if tx.send(bar).await.is_err() {
                                debug!("[Stream {}] Worker gone, stopping transport", key);
                                return;
                            }
                        }
                        Ok(FeedEvent::Ignored) => {}
                        Ok(FeedEvent::Closed) => {
                            warn!("[Stream {}] Connection closed by upstream", key);
                            break;
                        }
                        Err(e) => {
                            warn!("[Stream {}] Connection error: {}", key, e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("[Stream {}] Connect failed: {}", key, e);
            }
        }

        if tx.is_closed() {
            return;
        }

        let delay = backoff.next_delay();
        info!("[Stream {}] Reconnecting in {:?}", key, delay);
        sleep(delay).await;
    }
}

/// Owns all mutable state of one subscription
pub struct SubscriptionWorker {
    key: SubscriptionKey,
    config: EngineConfig,
    feed: Arc<dyn MarketFeed>,
    finalizer: CandleFinalizer,
    evaluator: TriggerEvaluator,
    active: Arc<ActiveTriggerIndex>,
    events: mpsc::UnboundedSender<TriggerEvent>,
}

impl SubscriptionWorker {
    pub fn new(
        key: SubscriptionKey,
        config: EngineConfig,
        feed: Arc<dyn MarketFeed>,
        active: Arc<ActiveTriggerIndex>,
        events: mpsc::UnboundedSender<TriggerEvent>,
    ) -> Self {
        let finalizer = CandleFinalizer::new(key.clone(), config.history_capacity);
        let evaluator = TriggerEvaluator::new(key.clone());
        Self {
            key,
            config,
            feed,
            finalizer,
            evaluator,
            active,
            events,
        }
    }

    /// Seed, then stream until the command channel closes
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
        let seeder = HistorySeeder::new(self.config.seed.clone());
        match seeder.fetch(self.feed.as_ref(), &self.key, now_ms()).await {
            Ok(bars) => {
                let applied = self.finalizer.seed(bars, now_ms());
                info!("[Stream {}] Seeded {} closed bars", self.key, applied);
            }
            Err(e) => warn!("[Stream {}] Starting cold: {}", self.key, e),
        }

        // Rules registered while seeding see the warm history
        while let Ok(command) = commands.try_recv() {
            self.handle_command(command);
        }

        let (tx, mut snapshots) = mpsc::channel(self.config.snapshot_buffer.max(1));
        let backoff = Backoff::new(
            self.config.reconnect_base_delay,
            self.config.reconnect_max_delay,
        );
        let _transport = AbortOnDrop(tokio::spawn(run_transport(
            Arc::clone(&self.feed),
            self.key.clone(),
            tx,
            backoff,
        )));

        let mut watchdog = interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(bar) = snapshots.recv() => {
                    self.finalizer.ingest_snapshot(bar);
                    self.drain_closed(now_ms());
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("[Stream {}] Engine dropped, stopping", self.key);
                        break;
                    }
                },

                _ = watchdog.tick() => {
                    let now = now_ms();
                    self.drain_closed(now);
                    let expired = self.evaluator.expire(now);
                    self.publish(expired);
                }
            }
        }
    }

    fn handle_command(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::AddRule(rule) => {
                for spec in rule.indicator_specs() {
                    self.finalizer.ensure_indicator(spec);
                }
                let order_id = rule.order_id;
                if !self.evaluator.add(rule) {
                    debug!("[Stream {}] Order {} already pending", self.key, order_id);
                }
            }
            WorkerCommand::Cancel(order_id) => {
                if self.evaluator.remove(order_id) {
                    info!("[Stream {}] Order {} cancelled", self.key, order_id);
                }
            }
        }
    }

    /// Finalize every bar closed by `now` and evaluate rules against each
    fn drain_closed(&mut self, now: i64) {
        while let Some(closed) = self.finalizer.try_finalize(now) {
            debug!("[Stream {}] Closed {}", self.key, closed);
            if self.evaluator.is_empty() {
                continue;
            }
            let events = self.evaluator.evaluate(&closed, now);
            self.publish(events);
        }
    }

    /// Deliver events for orders that are still claimed in the active index.
    ///
    /// A cancel releases the index entry before its command reaches this
    /// worker, so an event whose entry is already gone is dropped.
    fn publish(&mut self, events: Vec<TriggerEvent>) {
        for event in events {
            let order_id = event.order_id();
            let claimed = if self.evaluator.contains(order_id) {
                // recurring rule that fired stays pending
                self.active.contains(order_id)
            } else {
                self.active.remove(order_id).is_some()
            };

            if !claimed {
                self.evaluator.remove(order_id);
                debug!(
                    "[Stream {}] Dropping event for cancelled order {}",
                    self.key, order_id
                );
                continue;
            }
            if self.events.send(event).is_err() {
                debug!("[Stream {}] No event receiver", self.key);
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionWorker")
            .field("key", &self.key)
            .field("pending", &self.evaluator.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trigger_core::{
        BarField, CandleConnection, CandleInterval, Direction, FeedError, FirePolicy, Operand,
    };

    const MINUTE: i64 = 60_000;

    /// Feed that is never actually driven; the worker is stepped by hand
    struct IdleFeed;

    #[async_trait]
    impl MarketFeed for IdleFeed {
        fn canonical_symbol(&self, symbol: &str) -> String {
            symbol.to_string()
        }

        async fn fetch_closed_bars(
            &self,
            _key: &SubscriptionKey,
            _start_ms: i64,
            _end_ms: i64,
        ) -> Result<Vec<Bar>, FeedError> {
            Ok(Vec::new())
        }

        async fn connect(
            &self,
            _key: &SubscriptionKey,
        ) -> Result<Box<dyn CandleConnection>, FeedError> {
            Err(FeedError::network("not used"))
        }
    }

    fn key() -> SubscriptionKey {
        SubscriptionKey::new("BTC", CandleInterval::OneMinute)
    }

    fn bar(index: i64, close: f64) -> Bar {
        Bar {
            symbol: "BTC".to_string(),
            interval: CandleInterval::OneMinute,
            start_time: index * MINUTE,
            end_time: (index + 1) * MINUTE - 1,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            trade_count: 1,
        }
    }

    /// close > 100
    fn rule(order_id: OrderId, fire_policy: FirePolicy) -> Arc<RuleDefinition> {
        Arc::new(RuleDefinition {
            order_id,
            pair: "BTC".to_string(),
            interval: CandleInterval::OneMinute,
            lhs: Operand::Field { field: BarField::Close },
            direction: Direction::Above,
            rhs: Operand::Literal { value: 100.0 },
            cooldown_bars: None,
            confirmation: None,
            invalidation_halt: false,
            fire_policy,
            lifetime_ms: None,
            created_at_ms: 1,
        })
    }

    fn worker() -> (
        SubscriptionWorker,
        Arc<ActiveTriggerIndex>,
        mpsc::UnboundedReceiver<TriggerEvent>,
    ) {
        let active = Arc::new(ActiveTriggerIndex::new());
        let (events, events_rx) = mpsc::unbounded_channel();
        let worker = SubscriptionWorker::new(
            key(),
            EngineConfig::default(),
            Arc::new(IdleFeed),
            Arc::clone(&active),
            events,
        );
        (worker, active, events_rx)
    }

    fn add(worker: &mut SubscriptionWorker, active: &ActiveTriggerIndex, rule: Arc<RuleDefinition>) {
        assert!(active.try_insert(rule.order_id, &key()));
        worker.handle_command(WorkerCommand::AddRule(rule));
    }

    #[test]
    fn test_fire_releases_active_entry() {
        let (mut worker, active, mut events) = worker();
        add(&mut worker, &active, rule(1, FirePolicy::OneShot));

        worker.finalizer.ingest_snapshot(bar(0, 150.0));
        worker.drain_closed(MINUTE);

        assert!(matches!(events.try_recv(), Ok(TriggerEvent::Triggered(_))));
        assert!(!active.contains(1));
        assert!(worker.evaluator.is_empty());
    }

    #[test]
    fn test_bar_ahead_of_cancel_does_not_fire() {
        let (mut worker, active, mut events) = worker();
        add(&mut worker, &active, rule(1, FirePolicy::OneShot));

        // cancel releases the index entry; its command is still queued
        assert!(active.remove(1).is_some());
        worker.finalizer.ingest_snapshot(bar(0, 150.0));
        worker.drain_closed(MINUTE);

        assert!(events.try_recv().is_err());
        assert!(worker.evaluator.is_empty());

        worker.handle_command(WorkerCommand::Cancel(1));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_cancelled_recurring_rule_stops_firing() {
        let (mut worker, active, mut events) = worker();
        add(&mut worker, &active, rule(1, FirePolicy::Recurring));

        worker.finalizer.ingest_snapshot(bar(0, 150.0));
        worker.drain_closed(MINUTE);
        assert!(matches!(events.try_recv(), Ok(TriggerEvent::Triggered(_))));
        assert!(active.contains(1));

        assert!(active.remove(1).is_some());
        worker.finalizer.ingest_snapshot(bar(1, 160.0));
        worker.drain_closed(2 * MINUTE);

        assert!(events.try_recv().is_err());
        assert!(!worker.evaluator.contains(1));
    }
}
