//! Stream live candles for one coin from Hyperliquid
//!
//! Usage: cargo run -p trigger-hyperliquid --example stream_candles -- BTC 1m

use chrono::{TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use trigger_core::{CandleInterval, FeedEvent, MarketFeed, SubscriptionKey};
use trigger_hyperliquid::{HyperliquidFeed, HyperliquidFeedConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let coin = args.next().unwrap_or_else(|| "BTC".to_string());
    let interval: CandleInterval = args.next().unwrap_or_else(|| "1m".to_string()).parse()?;

    let feed = HyperliquidFeed::new(HyperliquidFeedConfig::default())?;
    let key = SubscriptionKey::new(feed.canonical_symbol(&coin), interval);

    let now = Utc::now().timestamp_millis();
    let history = feed
        .fetch_closed_bars(&key, now - 10 * interval.to_millis(), now)
        .await?;
    println!("Fetched {} recent bars for {}", history.len(), key);

    let mut connection = feed.connect(&key).await?;
    loop {
        match connection.recv().await? {
            FeedEvent::Candle(bar) => {
                let end = Utc
                    .timestamp_millis_opt(bar.end_time)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!(
                    "{} close={} high={} low={} volume={} trades={} ends={}",
                    key, bar.close, bar.high, bar.low, bar.volume, bar.trade_count, end
                );
            }
            FeedEvent::Ignored => {}
            FeedEvent::Closed => {
                println!("Connection closed");
                return Ok(());
            }
        }
    }
}
