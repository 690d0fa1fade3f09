//! Daemon configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use trigger_engine::{EngineConfig, SeedConfig};
use trigger_hyperliquid::{HyperliquidFeedConfig, HYPERLIQUID_INFO_URL, HYPERLIQUID_WS_URL};

const DEFAULT_SEED_BARS: usize = 1000;
const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 500;

/// Configuration for the trigger daemon
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub ws_url: Url,
    pub rest_url: Url,
    /// JSON array of pending rules to register at start
    pub rules_path: Option<PathBuf>,
    /// Endpoint that receives triggered orders
    pub webhook_url: Option<Url>,
    /// JSON object mapping user-facing names to venue coins
    pub aliases_path: Option<PathBuf>,
    pub seed_bars: usize,
    pub watchdog_interval: Duration,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - HYPERLIQUID_WS_URL, HYPERLIQUID_REST_URL: venue endpoints (mainnet by default)
    /// - TRIGGER_RULES_PATH: pending rules file
    /// - TRIGGER_WEBHOOK_URL: execution webhook
    /// - SYMBOL_ALIASES_PATH: alias table
    /// - SEED_BARS: bars fetched to warm up each subscription
    /// - WATCHDOG_INTERVAL_MS: bar-close polling period
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let ws_url = parse_url(
            "HYPERLIQUID_WS_URL",
            &var("HYPERLIQUID_WS_URL").unwrap_or_else(|| HYPERLIQUID_WS_URL.to_string()),
        )?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                field: "HYPERLIQUID_WS_URL".to_string(),
                error: format!("unsupported scheme {}", ws_url.scheme()),
            });
        }

        let rest_url = parse_url(
            "HYPERLIQUID_REST_URL",
            &var("HYPERLIQUID_REST_URL").unwrap_or_else(|| HYPERLIQUID_INFO_URL.to_string()),
        )?;

        let webhook_url = var("TRIGGER_WEBHOOK_URL")
            .map(|value| parse_url("TRIGGER_WEBHOOK_URL", &value))
            .transpose()?;

        let seed_bars = match var("SEED_BARS") {
            Some(value) => parse_number::<usize>("SEED_BARS", &value)?,
            None => DEFAULT_SEED_BARS,
        };
        if seed_bars == 0 {
            return Err(ConfigError::InvalidNumber {
                field: "SEED_BARS".to_string(),
                value: "0".to_string(),
            });
        }

        let watchdog_ms = match var("WATCHDOG_INTERVAL_MS") {
            Some(value) => parse_number::<u64>("WATCHDOG_INTERVAL_MS", &value)?,
            None => DEFAULT_WATCHDOG_INTERVAL_MS,
        };
        if watchdog_ms == 0 {
            return Err(ConfigError::InvalidNumber {
                field: "WATCHDOG_INTERVAL_MS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            ws_url,
            rest_url,
            rules_path: var("TRIGGER_RULES_PATH").map(PathBuf::from),
            webhook_url,
            aliases_path: var("SYMBOL_ALIASES_PATH").map(PathBuf::from),
            seed_bars,
            watchdog_interval: Duration::from_millis(watchdog_ms),
        })
    }

    /// Feed settings, minus the alias table which is loaded separately
    pub fn feed_config(&self) -> HyperliquidFeedConfig {
        HyperliquidFeedConfig {
            ws_url: self.ws_url.to_string(),
            info_url: self.rest_url.to_string(),
            ..HyperliquidFeedConfig::default()
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            watchdog_interval: self.watchdog_interval,
            // keep enough closed bars to warm any indicator seeding can support
            history_capacity: self.seed_bars,
            seed: SeedConfig {
                bars: self.seed_bars,
                ..SeedConfig::default()
            },
            ..EngineConfig::default()
        }
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        error: e.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL in {field}: {error}")]
    InvalidUrl { field: String, error: String },

    #[error("Invalid number in {field}: {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Invalid JSON in {field}: {error}")]
    InvalidJson { field: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DaemonConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.ws_url.as_str(), "wss://api.hyperliquid.xyz/ws");
        assert_eq!(config.rest_url.as_str(), "https://api.hyperliquid.xyz/info");
        assert!(config.rules_path.is_none());
        assert!(config.webhook_url.is_none());
        assert_eq!(config.seed_bars, 1000);
        assert_eq!(config.watchdog_interval, Duration::from_millis(500));

        let engine = config.engine_config();
        assert_eq!(engine.seed.bars, 1000);
        assert_eq!(engine.seed.max_attempts, 5);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TRIGGER_RULES_PATH", "rules.json"),
            ("TRIGGER_WEBHOOK_URL", "http://localhost:8080/executions"),
            ("SEED_BARS", "500"),
            ("WATCHDOG_INTERVAL_MS", " 250 "),
            ("HYPERLIQUID_WS_URL", "wss://api.hyperliquid-testnet.xyz/ws"),
        ])
        .unwrap();

        assert_eq!(config.rules_path, Some(PathBuf::from("rules.json")));
        assert_eq!(
            config.webhook_url.as_ref().unwrap().as_str(),
            "http://localhost:8080/executions"
        );
        assert_eq!(config.seed_bars, 500);
        assert_eq!(config.watchdog_interval, Duration::from_millis(250));
        assert_eq!(config.engine_config().history_capacity, 500);
        // rules needing more than the seeded history are refused at registration
        assert_eq!(config.engine_config().warmup_limit(), 500);
        assert_eq!(
            config.feed_config().ws_url,
            "wss://api.hyperliquid-testnet.xyz/ws"
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("SEED_BARS", "lots")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            load(&[("WATCHDOG_INTERVAL_MS", "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            load(&[("TRIGGER_WEBHOOK_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            load(&[("HYPERLIQUID_WS_URL", "https://api.hyperliquid.xyz/ws")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("TRIGGER_WEBHOOK_URL", "  "), ("SEED_BARS", "")]).unwrap();
        assert!(config.webhook_url.is_none());
        assert_eq!(config.seed_bars, 1000);
    }
}
