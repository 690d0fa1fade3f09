//! Engine tuning

use std::time::Duration;

/// Configuration for history seeding
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Closed bars requested on subscription start
    pub bars: usize,
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each retry delay
    pub max_jitter: Duration,
    /// Timeout applied to every attempt
    pub request_timeout: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            bars: 1000,
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Configuration for the TriggerEngine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often each subscription re-checks its live bar for closure
    pub watchdog_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Closed bars retained per subscription for late indicator warm-up
    pub history_capacity: usize,
    /// Capacity of the transport -> worker snapshot channel
    pub snapshot_buffer: usize,
    pub seed: SeedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_millis(500),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            history_capacity: 1000,
            snapshot_buffer: 256,
            seed: SeedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Longest warm-up a rule may need: bars both seeded and retained
    pub fn warmup_limit(&self) -> usize {
        self.history_capacity.min(self.seed.bars)
    }
}
