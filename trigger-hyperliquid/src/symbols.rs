//! Symbol alias resolution
//!
//! Users name pairs the way the trading UI shows them (`UBTC`, `hype_1`,
//! `PURR-USDC`); candle subscriptions need the venue coin name.

use std::collections::HashMap;

use trigger_core::FeedError;

/// Tickers that start with `U` but are not wrapped assets
const WRAP_PREFIX_EXEMPT: &[&str] = &["USDC", "USDT", "USDE", "USDH", "UNI", "UMA"];

/// Maps user-facing symbols to Hyperliquid coin names
#[derive(Debug, Clone, Default)]
pub struct SymbolResolver {
    /// Upper-cased alias -> venue coin
    aliases: HashMap<String, String>,
}

impl SymbolResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with an explicit alias table; keys match case-insensitively
    pub fn with_aliases(aliases: HashMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(name, coin)| (name.trim().to_uppercase(), coin.trim().to_string()))
            .collect();
        Self { aliases }
    }

    /// Load a `{"name": "coin"}` JSON mapping, e.g. `{"HYPE_1": "@107"}`
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        let aliases: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| FeedError::parse(format!("Invalid symbol alias table: {}", e)))?;
        Ok(Self::with_aliases(aliases))
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Resolve `symbol` to the venue's canonical coin name
    pub fn canonicalize(&self, symbol: &str) -> String {
        let trimmed = symbol.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        // Spot index ids are already canonical
        if trimmed.starts_with('@') {
            return trimmed.to_string();
        }

        let upper = trimmed.to_uppercase();
        if let Some(coin) = self.aliases.get(&upper) {
            return coin.clone();
        }

        if upper.contains('/') || upper.contains('-') {
            let pair = upper.replace('-', "/");
            return self.aliases.get(&pair).cloned().unwrap_or(pair);
        }

        if upper.len() > 1 && upper.starts_with('U') && !WRAP_PREFIX_EXEMPT.contains(&upper.as_str()) {
            return upper[1..].to_string();
        }

        upper
    }
}
