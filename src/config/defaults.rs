//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Location of the config file itself
pub const DEFAULT_CONFIG_PATH: &str = "~/.keyboard-shortcuts/config.json";

/// Where persisted shortcuts live
pub const DEFAULT_STORE_PATH: &str = "~/.keyboard-shortcuts/shortcuts.json";

/// Reload the store when another process edits it
pub const DEFAULT_WATCH_STORE: bool = true;

/// Global enable flag at startup
pub const DEFAULT_ENABLED: bool = true;

/// Register with the OS (false = headless, events injected by the host)
pub const DEFAULT_USE_SYSTEM_HOTKEYS: bool = true;
