//! Shared subscription state
//!
//! `SubscriptionRegistry` maps each canonical series to its running worker
//! and guarantees at most one worker per key. `ActiveTriggerIndex` maps
//! pending orders to the series evaluating them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use trigger_core::{OrderId, SubscriptionKey};

use crate::runner::WorkerCommand;

/// A running subscription worker
#[derive(Debug)]
pub struct SubscriptionHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn new(commands: mpsc::UnboundedSender<WorkerCommand>, task: JoinHandle<()>) -> Self {
        Self { commands, task }
    }

    fn is_running(&self) -> bool {
        !self.commands.is_closed() && !self.task.is_finished()
    }
}

/// One worker per canonical (symbol, interval)
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriptionKey, SubscriptionHandle>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the worker for `key`, starting it with `spawn` if none is running.
    ///
    /// The check and the insert happen under the entry lock, so concurrent
    /// callers for the same key start exactly one worker. The flag reports
    /// whether this call started it.
    pub fn ensure<F>(&self, key: &SubscriptionKey, spawn: F) -> (mpsc::UnboundedSender<WorkerCommand>, bool)
    where
        F: FnOnce() -> SubscriptionHandle,
    {
        match self.subscriptions.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_running() {
                    return (entry.get().commands.clone(), false);
                }
                warn!("[Registry] Worker for {} stopped; restarting", key);
                let handle = spawn();
                let commands = handle.commands.clone();
                entry.insert(handle);
                (commands, true)
            }
            Entry::Vacant(entry) => {
                let handle = spawn();
                let commands = handle.commands.clone();
                entry.insert(handle);
                info!("[Registry] Started subscription {}", key);
                (commands, true)
            }
        }
    }

    /// Advisory only: running workers are never torn down here
    pub fn release(&self, key: &SubscriptionKey) {
        if self.subscriptions.contains_key(key) {
            debug!("[Registry] Release requested for {}; stream stays up", key);
        }
    }

    /// Send a command to the worker for `key`
    pub fn send(&self, key: &SubscriptionKey, command: WorkerCommand) -> bool {
        self.subscriptions
            .get(key)
            .map(|handle| handle.commands.send(command).is_ok())
            .unwrap_or(false)
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn keys(&self) -> Vec<SubscriptionKey> {
        self.subscriptions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Abort every worker and forget them
    pub fn shutdown(&self) {
        let keys = self.keys();
        for key in keys {
            if let Some((_, handle)) = self.subscriptions.remove(&key) {
                handle.task.abort();
            }
        }
        info!("[Registry] All subscriptions stopped");
    }
}

/// Pending order id -> series evaluating it
#[derive(Debug, Default)]
pub struct ActiveTriggerIndex {
    entries: DashMap<OrderId, SubscriptionKey>,
}

impl ActiveTriggerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `order_id` for `key`; false if it is already pending
    pub fn try_insert(&self, order_id: OrderId, key: &SubscriptionKey) -> bool {
        match self.entries.entry(order_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(key.clone());
                true
            }
        }
    }

    pub fn remove(&self, order_id: OrderId) -> Option<SubscriptionKey> {
        self.entries.remove(&order_id).map(|(_, key)| key)
    }

    pub fn get(&self, order_id: OrderId) -> Option<SubscriptionKey> {
        self.entries.get(&order_id).map(|key| key.clone())
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.entries.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending orders on `key`
    pub fn count_for(&self, key: &SubscriptionKey) -> usize {
        self.entries.iter().filter(|entry| entry.value() == key).count()
    }
}
