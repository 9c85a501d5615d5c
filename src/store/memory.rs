//! In-process settings store.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ChangeCallback, ObservationId, ObserverTable, SettingsStore};
use crate::error::Result;

/// Store backed by a plain map. Useful for tests and for embedding applications that
/// persist settings themselves.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    observers: ObserverTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live observations, for diagnostics.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let previous = self
            .values
            .write()
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.observers.notify(key, Some(value));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let previous = self.values.write().remove(key);
        if previous.is_some() {
            self.observers.notify(key, None);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    fn observe(&self, key: &str, callback: ChangeCallback) -> ObservationId {
        self.observers.add(key, callback)
    }

    fn cancel_observation(&self, id: ObservationId) {
        self.observers.remove(id);
    }
}
