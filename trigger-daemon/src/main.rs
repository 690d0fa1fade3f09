//! OHLCV Trigger Daemon
//!
//! Streams Hyperliquid candles for every pending rule and reports the
//! orders whose conditions are met.

mod config;
mod intake;
mod notifier;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trigger_engine::TriggerEngine;
use trigger_hyperliquid::HyperliquidFeed;

use crate::config::DaemonConfig;
use crate::notifier::Notifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,trigger_engine=debug")),
        )
        .init();

    info!("Starting OHLCV trigger daemon");

    let config = DaemonConfig::from_env().context("Invalid configuration")?;
    info!(
        "Hyperliquid endpoints: ws={} rest={}",
        config.ws_url, config.rest_url
    );

    let mut feed_config = config.feed_config();
    if let Some(path) = &config.aliases_path {
        feed_config.resolver = intake::load_aliases(path)?;
        info!(
            "Loaded {} symbol aliases from {}",
            feed_config.resolver.alias_count(),
            path.display()
        );
    }
    let feed = Arc::new(HyperliquidFeed::new(feed_config)?);

    let (engine, events) = TriggerEngine::new(config.engine_config(), feed);

    match &config.webhook_url {
        Some(url) => info!("Delivering executions to {}", url),
        None => info!("No TRIGGER_WEBHOOK_URL set - executions will only be logged"),
    }
    let notifier = Notifier::new(config.webhook_url.clone())?;
    let notifier_handle = tokio::spawn(notifier.run(events));

    match &config.rules_path {
        Some(path) => {
            let rules = intake::load_rules(path)?;
            intake::register_all(&engine, rules);
        }
        None => info!("No TRIGGER_RULES_PATH set - starting with no pending rules"),
    }

    info!(
        "Trigger daemon running: {} subscriptions, {} pending orders",
        engine.subscription_count(),
        engine.pending_count()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    engine.shutdown();
    notifier_handle.abort();

    Ok(())
}
