//! Configuration module - settings for the shortcut service
//!
//! This module provides functionality for:
//! - Loading configuration from ~/.keyboard-shortcuts/config.json
//! - Default values for all settings
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - `ShortcutsConfig`
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{DEFAULT_CONFIG_PATH, DEFAULT_STORE_PATH};

pub use types::ShortcutsConfig;

pub use loader::{load_config, load_config_from};

#[cfg(test)]
pub use defaults::{DEFAULT_ENABLED, DEFAULT_USE_SYSTEM_HOTKEYS, DEFAULT_WATCH_STORE};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
