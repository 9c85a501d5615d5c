//! JSON-file settings store with an optional file watcher.
//!
//! Format: a JSON object of store key -> raw value, e.g.
//!
//! ```json
//! {
//!   "KeyboardShortcuts_toggle": "{\"key\":\"u\",\"modifiers\":{\"cmd\":true,...}}",
//!   "KeyboardShortcuts_search": "false"
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{recommended_watcher, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{ChangeCallback, ObservationId, ObserverTable, SettingsStore};
use crate::error::{Result, ShortcutError};

/// Quiet period after the last file event before the store is re-read.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(200);

/// Settings store persisted as a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    // Serializes read-modify-write of the file between writers and reloads
    write_lock: Mutex<()>,
    observers: ObserverTable,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = Self::load(&path)?;
        info!(path = %path.display(), entries = values.len(), "Opened shortcut store");
        Ok(Self {
            path,
            values: RwLock::new(values),
            write_lock: Mutex::new(()),
            observers: ObserverTable::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).map_err(|source| ShortcutError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let io_err = |source| ShortcutError::Io {
            path: self.path.display().to_string(),
            source,
        };

        // Create parent directories if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, content).map_err(io_err)?;
        Ok(())
    }

    /// Apply a mutation, persist it, and notify observers if the key's value changed.
    fn update(&self, key: &str, value: Option<&str>) -> Result<()> {
        let guard = self.write_lock.lock();

        let mut next = self.values.read().clone();
        let previous = match value {
            Some(value) => next.insert(key.to_string(), value.to_string()),
            None => next.remove(key),
        };
        if previous.as_deref() == value {
            return Ok(());
        }

        self.save(&next)?;
        *self.values.write() = next;
        drop(guard);

        self.observers.notify(key, value);
        Ok(())
    }

    /// Re-read the file and notify observers of every key whose value differs.
    ///
    /// Called by `StoreFileWatcher` after external modifications. Echoes of our own
    /// writes find nothing changed.
    pub fn reload(&self) -> Result<()> {
        let write = self.write_lock.lock();
        let fresh = Self::load(&self.path)?;
        let previous = std::mem::replace(&mut *self.values.write(), fresh.clone());
        drop(write);

        let mut changed: Vec<(String, Option<String>)> = Vec::new();
        for (key, value) in &fresh {
            if previous.get(key) != Some(value) {
                changed.push((key.clone(), Some(value.clone())));
            }
        }
        for key in previous.keys() {
            if !fresh.contains_key(key) {
                changed.push((key.clone(), None));
            }
        }

        if !changed.is_empty() {
            info!(
                path = %self.path.display(),
                changed = changed.len(),
                "Shortcut store changed on disk"
            );
        }
        for (key, value) in changed {
            self.observers.notify(&key, value.as_deref());
        }
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(key, None)
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

/// Get the default path of the shortcut store.
pub fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".keyboard-shortcuts")
        .join("shortcuts.json")
}

/// Watches a `JsonFileStore`'s file and reloads the store when another process edits it.
///
/// Dropping the watcher stops the background thread.
pub struct StoreFileWatcher {
    watcher: Option<RecommendedWatcher>,
    watcher_thread: Option<thread::JoinHandle<()>>,
}

impl StoreFileWatcher {
    pub fn start(store: Arc<JsonFileStore>) -> Result<Self> {
        let store_path = store.path().to_path_buf();
        let watch_path = store_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&watch_path).map_err(|source| ShortcutError::Io {
            path: watch_path.display().to_string(),
            source,
        })?;

        let (watch_tx, watch_rx) = channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = watch_tx.send(res);
        })
        .map_err(|e| ShortcutError::Watch(e.to_string()))?;

        // Watch the directory so atomic replace-by-rename saves are seen too
        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| ShortcutError::Watch(e.to_string()))?;

        info!(
            path = %watch_path.display(),
            target = ?store_path.file_name(),
            "Shortcut store watcher started"
        );

        let watcher_thread = thread::Builder::new()
            .name("shortcut-store-watcher".to_string())
            .spawn(move || Self::watch_loop(store, watch_rx))
            .map_err(|e| ShortcutError::Watch(e.to_string()))?;

        Ok(Self {
            watcher: Some(watcher),
            watcher_thread: Some(watcher_thread),
        })
    }

    fn is_store_event(event: &notify::Event, store_path: &Path) -> bool {
        let relevant_kind = matches!(
            event.kind,
            notify::EventKind::Create(_)
                | notify::EventKind::Modify(_)
                | notify::EventKind::Remove(_)
        );
        relevant_kind
            && event
                .paths
                .iter()
                .any(|path| path.file_name() == store_path.file_name())
    }

    fn watch_loop(store: Arc<JsonFileStore>, rx: Receiver<notify::Result<notify::Event>>) {
        let store_path = store.path().to_path_buf();
        loop {
            match rx.recv() {
                Ok(Ok(event)) => {
                    if !Self::is_store_event(&event, &store_path) {
                        continue;
                    }
                    // Debounce: wait for the writer to go quiet
                    loop {
                        match rx.recv_timeout(RELOAD_DEBOUNCE) {
                            Ok(_) => continue,
                            Err(RecvTimeoutError::Timeout) => break,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    debug!(path = %store_path.display(), "Reloading shortcut store");
                    if let Err(e) = store.reload() {
                        warn!(error = %e, path = %store_path.display(), "Failed to reload shortcut store");
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, watcher = "store", "File watcher error");
                }
                Err(_) => {
                    info!(watcher = "store", "Shortcut store watcher shutting down");
                    break;
                }
            }
        }
    }
}

impl Drop for StoreFileWatcher {
    fn drop(&mut self) {
        // Dropping the notify watcher closes the channel, which ends the loop
        self.watcher.take();
        if let Some(handle) = self.watcher_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_nonexistent_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("missing.json")).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn writes_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("shortcuts.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("KeyboardShortcuts_a", "false").unwrap();
        store.set("KeyboardShortcuts_b", "x").unwrap();
        store.remove("KeyboardShortcuts_b").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("KeyboardShortcuts_a"), Some("false".to_string()));
        assert_eq!(reopened.get("KeyboardShortcuts_b"), None);
    }

    #[test]
    fn file_is_readable_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("KeyboardShortcuts_toggle", "false").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("KeyboardShortcuts_toggle"));
        assert!(content.contains('\n'));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(ShortcutError::Json(_))
        ));
    }

    #[test]
    fn reload_notifies_external_changes_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("k1", "one").unwrap();
        store.set("k2", "two").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        for key in ["k1", "k2", "k3"] {
            let sink = seen.clone();
            let key_name = key.to_string();
            store.observe(
                key,
                Arc::new(move |value: Option<&str>| {
                    sink.lock().push((key_name.clone(), value.map(str::to_string)));
                }),
            );
        }

        // Echo of our own write: nothing changes
        store.reload().unwrap();
        assert!(seen.lock().is_empty());

        // Another process rewrites the file
        fs::write(&path, r#"{"k1":"one","k3":"three"}"#).unwrap();
        store.reload().unwrap();

        let mut events = seen.lock().clone();
        events.sort();
        assert_eq!(
            events,
            vec![
                ("k2".to_string(), None),
                ("k3".to_string(), Some("three".to_string())),
            ]
        );
        assert_eq!(store.get("k3"), Some("three".to_string()));
    }

    #[test]
    fn watcher_starts_and_stops() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path().join("shortcuts.json")).unwrap());
        // Platform watchers may be unavailable in sandboxes; only check clean shutdown
        if let Ok(watcher) = StoreFileWatcher::start(store) {
            drop(watcher);
        }
    }
}
