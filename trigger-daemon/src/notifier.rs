//! Execution notifications
//!
//! Forwards triggered orders to the execution webhook. Delivery is
//! fire-and-forget: failures are logged and never retried.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use trigger_core::{ExecutionEvent, TriggerEvent};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    webhook: Option<Url>,
}

impl Notifier {
    pub fn new(webhook: Option<Url>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self { client, webhook })
    }

    /// Consume engine events until the engine goes away
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<TriggerEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TriggerEvent::Triggered(execution) => {
                    info!(
                        "[Notifier] Order {} triggered on {}/{} at {}",
                        execution.order_id, execution.symbol, execution.interval, execution.trigger_price
                    );
                    self.deliver(execution);
                }
                TriggerEvent::Invalidated { order_id, bar_end_time, .. } => {
                    info!("[Notifier] Order {} invalidated at bar {}", order_id, bar_end_time);
                }
                TriggerEvent::Expired { order_id, at_ms } => {
                    info!("[Notifier] Order {} expired at {}", order_id, at_ms);
                }
            }
        }
        debug!("[Notifier] Event stream ended");
    }

    fn deliver(&self, execution: ExecutionEvent) {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            let body = TriggerEvent::Triggered(execution);
            let order_id = body.order_id();
            match client.post(webhook).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("[Notifier] Delivered order {}", order_id);
                }
                Ok(response) => {
                    warn!(
                        "[Notifier] Webhook rejected order {}: {}",
                        order_id,
                        response.status()
                    );
                }
                Err(e) => {
                    error!("[Notifier] Failed to deliver order {}: {}", order_id, e);
                }
            }
        });
    }
}
