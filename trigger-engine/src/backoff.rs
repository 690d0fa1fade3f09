//! Capped exponential backoff
//!
//! Shared by the history seeder (with jitter) and the stream transport
//! (without). Delays start at `base`, double on every call and stop growing
//! at `max`; a successful operation resets the sequence.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts += 1;
        delay
    }

    /// Start over from `base`
    pub fn reset(&mut self) {
        self.current = self.base;
        self.attempts = 0;
    }

    /// Delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// `delay` plus a uniformly random amount in `[0, max_jitter]`
pub fn with_jitter(delay: Duration, max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return delay;
    }
    let jitter_ms = rand::rng().random_range(0..=max_ms);
    delay + Duration::from_millis(jitter_ms)
}
