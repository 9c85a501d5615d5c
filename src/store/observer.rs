//! Per-name observation of persisted shortcut values.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{KeyFormat, ObservationId, SettingsStore};
use crate::shortcuts::Name;

/// Receives the raw name whose persisted value changed. Must only enqueue work; the
/// registry reconciles on its owner context.
pub type ChangeSink = Arc<dyn Fn(&str) + Send + Sync>;

/// One store observation per observed name.
pub struct ChangeObservers {
    keys: KeyFormat,
    sink: ChangeSink,
    active: HashMap<String, ObservationId>,
}

impl ChangeObservers {
    pub fn new(keys: KeyFormat, sink: ChangeSink) -> Self {
        Self {
            keys,
            sink,
            active: HashMap::new(),
        }
    }

    /// Start observing a name. An existing observation is restarted, never duplicated.
    pub fn observe(&mut self, store: &dyn SettingsStore, name: &Name) {
        if let Some(previous) = self.active.remove(name.raw()) {
            store.cancel_observation(previous);
        }
        let id = self.start(store, name.raw());
        self.active.insert(name.raw().to_string(), id);
        debug!(name = %name, "Observing persisted shortcut");
    }

    pub fn stop(&mut self, store: &dyn SettingsStore, name: &Name) {
        if let Some(id) = self.active.remove(name.raw()) {
            store.cancel_observation(id);
        }
    }

    pub fn is_observing(&self, name: &Name) -> bool {
        self.active.contains_key(name.raw())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Move every observation from `old` to `new`. Existing data is not migrated.
    pub fn repoint(&mut self, old: &dyn SettingsStore, new: &dyn SettingsStore) {
        let raw_names: Vec<String> = self.active.keys().cloned().collect();
        for raw in raw_names {
            if let Some(id) = self.active.remove(&raw) {
                old.cancel_observation(id);
            }
            let id = self.start(new, &raw);
            self.active.insert(raw, id);
        }
    }

    pub fn stop_all(&mut self, store: &dyn SettingsStore) {
        for (_, id) in self.active.drain() {
            store.cancel_observation(id);
        }
    }

    fn start(&self, store: &dyn SettingsStore, raw: &str) -> ObservationId {
        let sink = self.sink.clone();
        let owned = raw.to_string();
        store.observe(
            &self.keys.key_for_raw(raw),
            Arc::new(move |_value: Option<&str>| sink(&owned)),
        )
    }
}
