//! Persistent shortcut configuration.
//!
//! A `SettingsStore` is a string key-value store with per-key change observation. Each
//! `Name` owns one key (`<prefix><name>`) whose value decodes to a `StoredValue`:
//!
//! | raw value           | meaning                                              |
//! |---------------------|------------------------------------------------------|
//! | absent              | `Unset` - never configured, or removed              |
//! | `false`             | `Disabled` - explicitly cleared a name with a default |
//! | shortcut JSON       | `Assigned(shortcut)`                                 |
//! | anything else       | `Malformed` - reads treat it as absent               |

mod file;
mod memory;
mod observer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::shortcuts::{Name, Shortcut};

pub use file::{default_store_path, JsonFileStore, StoreFileWatcher};
pub use memory::MemoryStore;
pub use observer::{ChangeObservers, ChangeSink};

/// Prefix prepended to every name to form its store key.
pub const DEFAULT_KEY_PREFIX: &str = "KeyboardShortcuts_";

/// Raw encoding of the disabled sentinel.
const DISABLED_SENTINEL: &str = "false";

/// Handle returned by `SettingsStore::observe`, used to cancel the observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObservationId(pub u64);

/// Called with the key's new raw value (None when removed).
pub type ChangeCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Backing store for persisted shortcuts.
///
/// Implementations must invoke observers for every change of an observed key's value,
/// whether the write came from this process or from outside (e.g. settings sync).
/// Callbacks must not be invoked while an internal lock is held.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All keys currently present, in no particular order.
    fn keys(&self) -> Vec<String>;
    fn observe(&self, key: &str, callback: ChangeCallback) -> ObservationId;
    fn cancel_observation(&self, id: ObservationId);
}

/// Observer bookkeeping shared by the store implementations.
#[derive(Default)]
pub(crate) struct ObserverTable {
    entries: Mutex<HashMap<ObservationId, (String, ChangeCallback)>>,
    next_id: AtomicU64,
}

impl ObserverTable {
    pub(crate) fn add(&self, key: &str, callback: ChangeCallback) -> ObservationId {
        let id = ObservationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(id, (key.to_string(), callback));
        id
    }

    pub(crate) fn remove(&self, id: ObservationId) {
        self.entries.lock().remove(&id);
    }

    /// Invoke every observer of `key`. Callbacks are cloned out first so they run unlocked.
    pub(crate) fn notify(&self, key: &str, value: Option<&str>) {
        let callbacks: Vec<ChangeCallback> = self
            .entries
            .lock()
            .values()
            .filter(|(observed, _)| observed == key)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Decoded state of a name's store entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredValue {
    Unset,
    Disabled,
    Assigned(Shortcut),
    Malformed,
}

impl StoredValue {
    pub fn decode(raw: Option<&str>) -> Self {
        match raw {
            None => StoredValue::Unset,
            Some(raw) if raw.trim() == DISABLED_SENTINEL => StoredValue::Disabled,
            Some(raw) => match Shortcut::from_json(raw) {
                Some(shortcut) => StoredValue::Assigned(shortcut),
                None => StoredValue::Malformed,
            },
        }
    }

    /// Raw value to persist, or None when the entry should be removed.
    pub fn encode(&self) -> Result<Option<String>> {
        Ok(match self {
            StoredValue::Unset | StoredValue::Malformed => None,
            StoredValue::Disabled => Some(DISABLED_SENTINEL.to_string()),
            StoredValue::Assigned(shortcut) => Some(shortcut.to_json()?),
        })
    }

    pub fn shortcut(&self) -> Option<&Shortcut> {
        match self {
            StoredValue::Assigned(shortcut) => Some(shortcut),
            _ => None,
        }
    }
}

/// Maps names to store keys and back.
#[derive(Clone, Debug)]
pub struct KeyFormat {
    prefix: String,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl KeyFormat {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, name: &Name) -> String {
        self.key_for_raw(name.raw())
    }

    pub fn key_for_raw(&self, raw: &str) -> String {
        format!("{}{}", self.prefix, raw)
    }

    /// The raw name for a store key, if the key belongs to this format.
    pub fn name_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
            .filter(|raw| !raw.is_empty())
    }
}

/// Read and decode the entry for a name.
pub fn read_value(store: &dyn SettingsStore, keys: &KeyFormat, name: &Name) -> StoredValue {
    StoredValue::decode(store.get(&keys.key_for(name)).as_deref())
}

/// Encode and write (or remove) the entry for a name.
pub fn write_value(
    store: &dyn SettingsStore,
    keys: &KeyFormat,
    name: &Name,
    value: &StoredValue,
) -> Result<()> {
    let key = keys.key_for(name);
    match value.encode()? {
        Some(raw) => store.set(&key, &raw),
        None => store.remove(&key),
    }
}
