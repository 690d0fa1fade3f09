//! End-to-end engine tests against a scripted in-memory feed

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use trigger_core::{
    Bar, BandLine, BarField, CandleConnection, CandleInterval, Direction, FeedError, FeedEvent,
    FirePolicy, IndicatorKind, IndicatorRef, MarketFeed, Operand, OrderId, RuleDefinition,
    SubscriptionKey, TriggerEvent,
};
use trigger_engine::{run_transport, Backoff, EngineConfig, EngineError, TriggerEngine};

const MINUTE: i64 = 60_000;

/// What the next `connect` call does
enum Session {
    Refuse,
    Stream(Vec<FeedEvent>),
}

struct ScriptedConnection {
    events: VecDeque<FeedEvent>,
}

#[async_trait]
impl CandleConnection for ScriptedConnection {
    async fn recv(&mut self) -> Result<FeedEvent, FeedError> {
        match self.events.pop_front() {
            Some(event) => Ok(event),
            None => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct ScriptedFeed {
    history: Vec<Bar>,
    history_error: Option<FeedError>,
    sessions: Mutex<VecDeque<Session>>,
    connects: Mutex<Vec<Instant>>,
    fetches: AtomicUsize,
}

impl ScriptedFeed {
    fn new(history: Vec<Bar>, sessions: Vec<Session>) -> Self {
        Self {
            history,
            sessions: Mutex::new(sessions.into()),
            ..Default::default()
        }
    }

    fn connect_offsets(&self) -> Vec<u64> {
        let connects = self.connects.lock().unwrap();
        let first = connects[0];
        connects.iter().map(|at| (*at - first).as_secs()).collect()
    }
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    fn canonical_symbol(&self, symbol: &str) -> String {
        match symbol.trim().to_uppercase().as_str() {
            "UBTC" => "BTC".to_string(),
            other => other.to_string(),
        }
    }

    async fn fetch_closed_bars(
        &self,
        _key: &SubscriptionKey,
        _start_ms: i64,
        _end_ms: i64,
    ) -> Result<Vec<Bar>, FeedError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.history_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.history.clone()),
        }
    }

    async fn connect(&self, _key: &SubscriptionKey) -> Result<Box<dyn CandleConnection>, FeedError> {
        self.connects.lock().unwrap().push(Instant::now());
        let session = self.sessions.lock().unwrap().pop_front();
        match session {
            Some(Session::Refuse) => Err(FeedError::network("connection refused")),
            Some(Session::Stream(events)) => Ok(Box::new(ScriptedConnection {
                events: events.into(),
            })),
            None => std::future::pending().await,
        }
    }
}

/// One-minute bar ending `end_time`
fn bar(end_time: i64, close: f64) -> Bar {
    Bar {
        symbol: "BTC".to_string(),
        interval: CandleInterval::OneMinute,
        start_time: end_time - MINUTE + 1,
        end_time,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10.0,
        trade_count: 5,
    }
}

fn close_above(order_id: OrderId, pair: &str, rhs: Operand) -> RuleDefinition {
    RuleDefinition {
        order_id,
        pair: pair.to_string(),
        interval: CandleInterval::OneMinute,
        lhs: Operand::Field { field: BarField::Close },
        direction: Direction::Above,
        rhs,
        cooldown_bars: None,
        confirmation: None,
        invalidation_halt: false,
        fire_policy: FirePolicy::OneShot,
        lifetime_ms: None,
        created_at_ms: Utc::now().timestamp_millis(),
    }
}

fn sma(length: usize) -> Operand {
    Operand::Indicator(IndicatorRef {
        kind: IndicatorKind::Sma,
        length,
        source: None,
        std_dev: None,
        band: BandLine::Middle,
    })
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TriggerEvent>) -> TriggerEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for trigger event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_rule_fires_on_seeded_indicator() {
    let start = Utc::now().timestamp_millis() - 60 * MINUTE;
    let history: Vec<Bar> = (1..=20).map(|i| bar(start + i * MINUTE, 100.0)).collect();
    let live = vec![
        FeedEvent::Ignored,
        FeedEvent::Candle(bar(start + 21 * MINUTE, 150.0)),
        FeedEvent::Candle(bar(start + 22 * MINUTE, 160.0)),
    ];
    let feed = Arc::new(ScriptedFeed::new(history, vec![Session::Stream(live)]));
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed.clone());

    let key = engine.register(close_above(1, "UBTC", sma(5))).unwrap();
    assert_eq!(key, SubscriptionKey::new("BTC", CandleInterval::OneMinute));

    match next_event(&mut events).await {
        TriggerEvent::Triggered(e) => {
            assert_eq!(e.order_id, 1);
            assert_eq!(e.symbol, "BTC");
            assert_eq!(e.trigger_price, 150.0);
            assert_eq!(e.bar_end_time, start + 21 * MINUTE);
            // SMA(5) over four seeded 100s and the live 150
            assert_eq!(e.rhs, 110.0);
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(!engine.is_pending(1));
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);
    assert!(timeout(Duration::from_millis(700), events.recv()).await.is_err());
    engine.shutdown();
}

#[tokio::test]
async fn test_watchdog_closes_quiet_bar() {
    let end_time = Utc::now().timestamp_millis() + 300;
    let live = vec![FeedEvent::Candle(bar(end_time, 150.0))];
    let feed = Arc::new(ScriptedFeed::new(Vec::new(), vec![Session::Stream(live)]));
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed);

    engine
        .register(close_above(2, "BTC", Operand::Literal { value: 120.0 }))
        .unwrap();

    match next_event(&mut events).await {
        TriggerEvent::Triggered(e) => {
            assert_eq!(e.order_id, 2);
            assert_eq!(e.bar_end_time, end_time);
        }
        other => panic!("unexpected event {:?}", other),
    }
    engine.shutdown();
}

#[tokio::test]
async fn test_failed_seed_starts_cold() {
    let end_time = Utc::now().timestamp_millis() - MINUTE;
    let live = vec![FeedEvent::Candle(bar(end_time, 150.0))];
    let feed = Arc::new(ScriptedFeed {
        history_error: Some(FeedError::Client {
            status: 400,
            message: "unknown coin".to_string(),
        }),
        ..ScriptedFeed::new(Vec::new(), vec![Session::Stream(live)])
    });
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed.clone());

    engine
        .register(close_above(3, "BTC", Operand::Literal { value: 120.0 }))
        .unwrap();

    assert!(matches!(next_event(&mut events).await, TriggerEvent::Triggered(_)));
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);
    engine.shutdown();
}

#[tokio::test]
async fn test_duplicate_registration_shares_subscription() {
    let feed = Arc::new(ScriptedFeed::default());
    let (engine, _events) = TriggerEngine::new(EngineConfig::default(), feed);

    let literal = Operand::Literal { value: 1.0 };
    let first = engine.register(close_above(1, "UBTC", literal.clone())).unwrap();
    let again = engine.register(close_above(1, "UBTC", literal.clone())).unwrap();
    let other_alias = engine.register(close_above(2, "btc", literal.clone())).unwrap();

    assert_eq!(first, again);
    assert_eq!(first, other_alias);
    assert_eq!(engine.subscription_count(), 1);
    assert_eq!(engine.pending_count(), 2);

    engine.register(close_above(3, "ETH", literal)).unwrap();
    assert_eq!(engine.subscription_count(), 2);

    // release is advisory
    engine.release("UBTC", CandleInterval::OneMinute);
    assert_eq!(engine.subscription_count(), 2);
    engine.shutdown();
    assert_eq!(engine.subscription_count(), 0);
}

#[tokio::test]
async fn test_cancel_removes_pending() {
    let feed = Arc::new(ScriptedFeed::default());
    let (engine, _events) = TriggerEngine::new(EngineConfig::default(), feed);

    engine
        .register(close_above(7, "BTC", Operand::Literal { value: 1.0 }))
        .unwrap();
    assert!(engine.is_pending(7));
    assert!(engine.cancel(7));
    assert!(!engine.is_pending(7));
    assert!(!engine.cancel(7));
    engine.shutdown();
}

#[tokio::test]
async fn test_invalid_rule_rejected() {
    let feed = Arc::new(ScriptedFeed::default());
    let (engine, _events) = TriggerEngine::new(EngineConfig::default(), feed);

    let result = engine.register(close_above(8, "BTC", sma(0)));
    assert!(matches!(result, Err(EngineError::InvalidRule(_))));
    assert_eq!(engine.subscription_count(), 0);
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_backoff_resets_after_connect() {
    let feed = Arc::new(ScriptedFeed::new(
        Vec::new(),
        vec![
            Session::Refuse,
            Session::Refuse,
            Session::Refuse,
            Session::Stream(vec![FeedEvent::Closed]),
            Session::Refuse,
            Session::Stream(Vec::new()),
        ],
    ));
    let key = SubscriptionKey::new("BTC", CandleInterval::OneMinute);
    let (tx, _rx) = mpsc::channel(16);
    let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));

    let transport = tokio::spawn(run_transport(feed.clone(), key, tx, backoff));
    tokio::time::sleep(Duration::from_secs(120)).await;

    // 1s, 2s, 4s; then a healthy session resets to 1s, 2s
    assert_eq!(feed.connect_offsets(), vec![0, 1, 3, 7, 8, 10]);
    transport.abort();
}

#[tokio::test(start_paused = true)]
async fn test_transport_backoff_is_capped() {
    let sessions = (0..9).map(|_| Session::Refuse).collect();
    let feed = Arc::new(ScriptedFeed::new(Vec::new(), sessions));
    let key = SubscriptionKey::new("ETH", CandleInterval::OneMinute);
    let (tx, _rx) = mpsc::channel(16);
    let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));

    let transport = tokio::spawn(run_transport(feed.clone(), key, tx, backoff));
    tokio::time::sleep(Duration::from_secs(600)).await;

    let offsets = feed.connect_offsets();
    let gaps: Vec<u64> = offsets.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps, vec![1, 2, 4, 8, 16, 30, 30, 30, 30]);
    transport.abort();
}

#[tokio::test]
async fn test_cancel_beats_queued_firing_bar() {
    let end_time = Utc::now().timestamp_millis() - MINUTE;
    let live = vec![FeedEvent::Candle(bar(end_time, 150.0))];
    let feed = Arc::new(ScriptedFeed::new(Vec::new(), vec![Session::Stream(live)]));
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed);

    engine
        .register(close_above(11, "BTC", Operand::Literal { value: 120.0 }))
        .unwrap();
    assert!(engine.cancel(11));

    assert!(timeout(Duration::from_millis(700), events.recv()).await.is_err());
    assert!(!engine.is_pending(11));
    engine.shutdown();
}

#[tokio::test]
async fn test_invalidated_order_is_no_longer_pending() {
    let end_time = Utc::now().timestamp_millis() - MINUTE;
    let live = vec![FeedEvent::Candle(bar(end_time, 100.0))];
    let feed = Arc::new(ScriptedFeed::new(Vec::new(), vec![Session::Stream(live)]));
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed);

    let mut rule = close_above(12, "BTC", Operand::Literal { value: 120.0 });
    rule.invalidation_halt = true;
    engine.register(rule).unwrap();

    match next_event(&mut events).await {
        TriggerEvent::Invalidated { order_id, lhs, rhs, .. } => {
            assert_eq!(order_id, 12);
            assert_eq!(lhs, 100.0);
            assert_eq!(rhs, 120.0);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!engine.is_pending(12));
    assert_eq!(engine.pending_count(), 0);
    engine.shutdown();
}

#[tokio::test]
async fn test_expired_order_is_no_longer_pending() {
    let feed = Arc::new(ScriptedFeed::default());
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed);

    let mut rule = close_above(13, "BTC", Operand::Literal { value: 120.0 });
    rule.lifetime_ms = Some(200);
    engine.register(rule).unwrap();
    assert!(engine.is_pending(13));

    match next_event(&mut events).await {
        TriggerEvent::Expired { order_id, .. } => assert_eq!(order_id, 13),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!engine.is_pending(13));
    engine.shutdown();
}

#[tokio::test]
async fn test_lifetime_counts_from_registration() {
    let feed = Arc::new(ScriptedFeed::default());
    let (engine, mut events) = TriggerEngine::new(EngineConfig::default(), feed);

    let mut rule = close_above(14, "BTC", Operand::Literal { value: 120.0 });
    rule.created_at_ms = 0;
    rule.lifetime_ms = Some(60_000);
    engine.register(rule).unwrap();

    // two watchdog ticks pass without expiring the rule
    assert!(timeout(Duration::from_millis(1_200), events.recv()).await.is_err());
    assert!(engine.is_pending(14));
    engine.shutdown();
}

#[tokio::test]
async fn test_rule_needing_more_history_than_kept_is_rejected() {
    let feed = Arc::new(ScriptedFeed::default());
    let config = EngineConfig {
        history_capacity: 50,
        ..EngineConfig::default()
    };
    let (engine, _events) = TriggerEngine::new(config, feed.clone());

    let result = engine.register(close_above(15, "BTC", sma(60)));
    assert!(matches!(
        result,
        Err(EngineError::InsufficientHistory {
            order_id: 15,
            needed: 60,
            available: 50
        })
    ));
    assert_eq!(engine.subscription_count(), 0);
    assert!(engine.register(close_above(16, "BTC", sma(50))).is_ok());
    engine.shutdown();

    // RSI needs one bar beyond its length
    let (engine, _events) = TriggerEngine::new(EngineConfig::default(), feed);
    let rsi = Operand::Indicator(IndicatorRef {
        kind: IndicatorKind::Rsi,
        length: 1000,
        source: None,
        std_dev: None,
        band: BandLine::Middle,
    });
    assert!(matches!(
        engine.register(close_above(17, "BTC", rsi)),
        Err(EngineError::InsufficientHistory { needed: 1001, .. })
    ));
}
