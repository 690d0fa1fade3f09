//! History seeding
//!
//! Warms up a subscription's indicators with recent closed bars before the
//! live stream opens. Transient upstream failures are retried with capped
//! backoff plus jitter; anything else, or an exhausted retry budget, gives
//! up and lets the stream start cold.

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use trigger_core::{Bar, FeedError, MarketFeed, SubscriptionKey};

use crate::backoff::{with_jitter, Backoff};
use crate::config::SeedConfig;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct HistorySeeder {
    config: SeedConfig,
}

impl HistorySeeder {
    pub fn new(config: SeedConfig) -> Self {
        Self { config }
    }

    /// Time range covering the configured number of bars up to `now_ms`
    pub fn window(&self, key: &SubscriptionKey, now_ms: i64) -> (i64, i64) {
        let span = key.interval.to_millis().saturating_mul(self.config.bars as i64);
        (now_ms.saturating_sub(span), now_ms)
    }

    /// Fetch recent closed bars for `key`, sorted by end time
    pub async fn fetch(
        &self,
        feed: &dyn MarketFeed,
        key: &SubscriptionKey,
        now_ms: i64,
    ) -> EngineResult<Vec<Bar>> {
        let (start_ms, end_ms) = self.window(key, now_ms);
        let mut backoff = Backoff::new(self.config.base_delay, self.config.max_delay);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match timeout(
                self.config.request_timeout,
                feed.fetch_closed_bars(key, start_ms, end_ms),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FeedError::Timeout),
            };

            let err = match result {
                Ok(mut bars) => {
                    bars.sort_by_key(|bar| bar.end_time);
                    info!(
                        "[Seeder] {} fetched {} bars on attempt {}",
                        key,
                        bars.len(),
                        attempt
                    );
                    return Ok(bars);
                }
                Err(e) => e,
            };

            if !err.is_transient() || attempt == max_attempts {
                return Err(EngineError::SeedFailed {
                    key: key.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = with_jitter(backoff.next_delay(), self.config.max_jitter);
            warn!(
                "[Seeder] {} attempt {}/{} failed: {}; retrying in {:?}",
                key, attempt, max_attempts, err, delay
            );
            sleep(delay).await;
        }
    }
}
