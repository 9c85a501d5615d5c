//! Configuration loading from file system

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::defaults::DEFAULT_CONFIG_PATH;
use super::types::ShortcutsConfig;

/// Load configuration from ~/.keyboard-shortcuts/config.json
///
/// Returns ShortcutsConfig::default() if the file is missing or unreadable.
#[instrument(name = "load_config")]
pub fn load_config() -> ShortcutsConfig {
    let config_path = PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref());
    load_config_from(&config_path)
}

/// Load configuration from an explicit path, with the same fallbacks as `load_config`.
pub fn load_config_from(config_path: &Path) -> ShortcutsConfig {
    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        return ShortcutsConfig::default();
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, path = %config_path.display(), "Failed to read config, using defaults");
            return ShortcutsConfig::default();
        }
    };

    match serde_json::from_str::<ShortcutsConfig>(&content) {
        Ok(config) => {
            info!(path = %config_path.display(), "Successfully loaded config");
            config
        }
        Err(e) => {
            // Provide helpful error message for the common mistake of snake_case keys
            let error_hint = if e.to_string().contains("unknown field") {
                "Hint: config keys are camelCase, e.g. \"storePath\" and \"keyPrefix\""
            } else {
                ""
            };
            warn!(
                error = %e,
                path = %config_path.display(),
                hint = %error_hint,
                "Failed to parse config JSON, using defaults"
            );
            ShortcutsConfig::default()
        }
    }
}
