//! Hyperliquid WebSocket candle connection
//!
//! One connection per subscribed series. The connection sends the candle
//! subscription on open, keeps the session alive with application-level
//! pings, and turns pushes on the `candle` channel into `Bar` snapshots.
//! Reconnection is owned by the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use trigger_core::{CandleConnection, FeedError, FeedEvent, SubscriptionKey};

use crate::types::{CandleSubscription, HyperliquidCandle, WsEnvelope, WsRequest};

/// Keepalive cadence; the venue drops sessions idle for 60s
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A subscribed candle stream for one (coin, interval)
pub struct HyperliquidCandleConnection {
    key: SubscriptionKey,
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    ping_timer: Interval,
}

impl HyperliquidCandleConnection {
    /// Connect to `ws_url` and subscribe to the candle channel for `key`
    pub async fn connect(
        ws_url: &str,
        key: &SubscriptionKey,
        ping_interval: Duration,
    ) -> Result<Self, FeedError> {
        info!("[HL WS] Connecting to {} for {}", ws_url, key);

        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| FeedError::network(format!("Connection failed: {}", e)))?;

        let (mut write, read) = ws_stream.split();

        let request = WsRequest::Subscribe {
            subscription: CandleSubscription::new(&key.symbol, key.interval),
        };
        let json = serde_json::to_string(&request)
            .map_err(|e| FeedError::parse(format!("Failed to encode subscribe: {}", e)))?;
        write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| FeedError::network(format!("Failed to subscribe: {}", e)))?;

        info!("[HL WS] Subscribed to {}", key);

        Ok(Self {
            key: key.clone(),
            write,
            read,
            ping_timer: interval_at(Instant::now() + ping_interval, ping_interval),
        })
    }

    async fn send_ping(&mut self) -> Result<(), FeedError> {
        let json = serde_json::to_string(&WsRequest::Ping)
            .map_err(|e| FeedError::parse(format!("Failed to encode ping: {}", e)))?;
        self.write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| FeedError::network(format!("Failed to send ping: {}", e)))
    }
}

#[async_trait]
impl CandleConnection for HyperliquidCandleConnection {
    async fn recv(&mut self) -> Result<FeedEvent, FeedError> {
        loop {
            tokio::select! {
                msg = self.read.next() => {
                    return match msg {
                        Some(Ok(Message::Text(text))) => Ok(parse_message(&text, &self.key)),
                        Some(Ok(Message::Ping(data))) => {
                            self.write
                                .send(Message::Pong(data))
                                .await
                                .map_err(|e| FeedError::network(format!("Failed to send pong: {}", e)))?;
                            Ok(FeedEvent::Ignored)
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("[HL WS] Connection for {} closed by server: {:?}", self.key, frame);
                            Ok(FeedEvent::Closed)
                        }
                        Some(Ok(_)) => Ok(FeedEvent::Ignored),
                        Some(Err(e)) => Err(FeedError::network(e.to_string())),
                        None => Ok(FeedEvent::Closed),
                    };
                }

                _ = self.ping_timer.tick() => {
                    self.send_ping().await?;
                }
            }
        }
    }
}

/// Decode one text frame for `key`
///
/// Anything that is not a well-formed candle for this series is dropped.
pub(crate) fn parse_message(text: &str, key: &SubscriptionKey) -> FeedEvent {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) => {
            debug!("[HL WS] Failed to parse message: {}", text);
            return FeedEvent::Ignored;
        }
    };

    match envelope.channel.as_str() {
        "candle" => {
            let candle: HyperliquidCandle = match serde_json::from_value(envelope.data) {
                Ok(candle) => candle,
                Err(e) => {
                    debug!("[HL WS] Malformed candle payload: {}", e);
                    return FeedEvent::Ignored;
                }
            };
            match candle.into_bar() {
                Ok(bar) if bar.symbol == key.symbol && bar.interval == key.interval => {
                    FeedEvent::Candle(bar)
                }
                Ok(bar) => {
                    debug!("[HL WS] Unroutable candle {}/{} on {}", bar.symbol, bar.interval, key);
                    FeedEvent::Ignored
                }
                Err(e) => {
                    debug!("[HL WS] Unusable candle: {}", e);
                    FeedEvent::Ignored
                }
            }
        }
        "error" => {
            warn!("[HL WS] Error on {}: {}", key, envelope.data);
            FeedEvent::Ignored
        }
        "subscriptionResponse" | "pong" => FeedEvent::Ignored,
        other => {
            debug!("[HL WS] Unknown channel: {}", other);
            FeedEvent::Ignored
        }
    }
}

impl std::fmt::Debug for HyperliquidCandleConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidCandleConnection")
            .field("key", &self.key)
            .finish()
    }
}
