//! Startup rule intake
//!
//! Pending rules survive restarts as a JSON array on disk; every entry is
//! re-registered (and its series re-seeded) when the daemon starts.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use trigger_core::RuleDefinition;
use trigger_engine::TriggerEngine;
use trigger_hyperliquid::SymbolResolver;

use crate::config::ConfigError;

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

/// Parse a pending-rules document
///
/// Rules without a creation time keep `created_at_ms == 0`; the engine
/// stamps them when they are registered.
pub fn parse_rules(json: &str) -> Result<Vec<RuleDefinition>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson {
        field: "TRIGGER_RULES_PATH".to_string(),
        error: e.to_string(),
    })
}

pub fn load_rules(path: &Path) -> Result<Vec<RuleDefinition>, ConfigError> {
    parse_rules(&read(path)?)
}

pub fn load_aliases(path: &Path) -> Result<SymbolResolver, ConfigError> {
    SymbolResolver::from_json(&read(path)?).map_err(|e| ConfigError::InvalidJson {
        field: "SYMBOL_ALIASES_PATH".to_string(),
        error: e.to_string(),
    })
}

/// Register every rule, skipping the ones the engine rejects.
///
/// Returns the number registered.
pub fn register_all(engine: &TriggerEngine, rules: Vec<RuleDefinition>) -> usize {
    let total = rules.len();
    let mut registered = 0;
    for rule in rules {
        let order_id = rule.order_id;
        match engine.register(rule) {
            Ok(key) => {
                registered += 1;
                info!("[Intake] Order {} pending on {}", order_id, key);
            }
            Err(e) => warn!("[Intake] Skipping order {}: {}", order_id, e),
        }
    }
    info!("[Intake] Registered {}/{} pending rules", registered, total);
    registered
}
