//! Configuration type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::store::DEFAULT_KEY_PREFIX;

/// Settings for the shortcut service.
///
/// ```json
/// {
///   "storePath": "~/.keyboard-shortcuts/shortcuts.json",
///   "keyPrefix": "KeyboardShortcuts_",
///   "watchStore": true,
///   "enabled": true,
///   "useSystemHotkeys": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShortcutsConfig {
    /// Store file, `~` is expanded (default: ~/.keyboard-shortcuts/shortcuts.json)
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Prefix of every store key (default: KeyboardShortcuts_)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Watch the store file for external edits (default: true)
    #[serde(default = "default_watch_store")]
    pub watch_store: bool,
    /// Deliver shortcut events at startup (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Register shortcuts with the OS (default: true)
    #[serde(default = "default_use_system_hotkeys")]
    pub use_system_hotkeys: bool,
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}
fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}
fn default_watch_store() -> bool {
    DEFAULT_WATCH_STORE
}
fn default_enabled() -> bool {
    DEFAULT_ENABLED
}
fn default_use_system_hotkeys() -> bool {
    DEFAULT_USE_SYSTEM_HOTKEYS
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        ShortcutsConfig {
            store_path: default_store_path(),
            key_prefix: default_key_prefix(),
            watch_store: DEFAULT_WATCH_STORE,
            enabled: DEFAULT_ENABLED,
            use_system_hotkeys: DEFAULT_USE_SYSTEM_HOTKEYS,
        }
    }
}

impl ShortcutsConfig {
    /// Store path with `~` expanded.
    pub fn resolved_store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path).as_ref())
    }
}
