use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::CHANNEL_CAPACITY;
use crate::error::Result;
use crate::store::{SharedStore, StoreChange, WriterId};

/// Process-local store. Several monitors holding the same `Arc<MemoryStore>`
/// behave like tabs of one browser.
pub struct MemoryStore {
    entries: DashMap<String, String>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish(&self, key: &str, new_value: Option<String>, origin: Option<WriterId>) {
        // No receivers is fine.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: DashMap::new(),
            changes,
        }
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str, origin: WriterId) -> Result<()> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        // Rewriting an identical value is not a change.
        if previous.as_deref() != Some(value) {
            self.publish(key, Some(value.to_string()), Some(origin));
        }
        Ok(())
    }

    fn remove(&self, key: &str, origin: WriterId) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.publish(key, None, Some(origin));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
