use thiserror::Error;
use tracing::{error, warn};

/// Error severity for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,    // informational, e.g. nothing configured
    Warning, // recoverable
    Error,   // operation failed
}

/// Domain-specific errors for the shortcut registry.
///
/// Most public operations degrade silently (the shortcut simply behaves as unset) and only
/// log these. The `try_*` variants on the registry and the service handle return them.
#[derive(Error, Debug)]
pub enum ShortcutError {
    #[error("no shortcut is configured for '{name}'")]
    NotConfigured { name: String },

    #[error("failed to register hotkey '{shortcut}': {message}")]
    RegistrationFailed { shortcut: String, message: String },

    #[error("hotkey backend unavailable: {0}")]
    Backend(String),

    #[error("settings store error: {0}")]
    Store(String),

    #[error("settings file error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file watch error: {0}")]
    Watch(String),

    #[error("shortcut service has stopped")]
    ServiceStopped,

    #[error("blocking query issued from the shortcut owner thread")]
    ReentrantQuery,
}

impl ShortcutError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConfigured { .. } => ErrorSeverity::Info,
            Self::RegistrationFailed { .. } => ErrorSeverity::Warning,
            Self::Backend(_) => ErrorSeverity::Error,
            Self::Store(_) => ErrorSeverity::Error,
            Self::Io { .. } => ErrorSeverity::Error,
            Self::Json(_) => ErrorSeverity::Warning,
            Self::Watch(_) => ErrorSeverity::Warning,
            Self::ServiceStopped => ErrorSeverity::Error,
            Self::ReentrantQuery => ErrorSeverity::Error,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured { name } => format!("No shortcut set for {}", name),
            Self::RegistrationFailed { shortcut, .. } => format!(
                "{} could not be registered. It may be in use by another app.",
                shortcut
            ),
            Self::Backend(msg) => format!("Global shortcuts are unavailable: {}", msg),
            Self::Store(msg) => format!("Could not save shortcut settings: {}", msg),
            Self::Io { path, .. } => format!("Could not access {}", path),
            Self::Json(e) => format!("Invalid shortcut settings: {}", e),
            Self::Watch(msg) => format!("Settings watcher issue: {}", msg),
            Self::ServiceStopped => "Keyboard shortcuts are not running".to_string(),
            Self::ReentrantQuery => {
                "Shortcut state cannot be queried from inside a shortcut handler".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ShortcutError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use keyboard_shortcuts::error::ResultExt;
///
/// // A failed OS registration leaves the shortcut inert
/// bridge.register(&shortcut).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_distinguishes_unconfigured_from_failed_registration() {
        let unconfigured = ShortcutError::NotConfigured {
            name: "toggle".to_string(),
        };
        let failed = ShortcutError::RegistrationFailed {
            shortcut: "⌘U".to_string(),
            message: "taken".to_string(),
        };
        assert_eq!(unconfigured.severity(), ErrorSeverity::Info);
        assert_eq!(failed.severity(), ErrorSeverity::Warning);
        assert!(failed.user_message().contains("⌘U"));
    }

    #[test]
    fn result_ext_returns_value_or_none() {
        let ok: std::result::Result<u8, String> = Ok(3);
        let err: std::result::Result<u8, String> = Err("boom".to_string());
        assert_eq!(ok.log_err(), Some(3));
        assert_eq!(err.warn_on_err(), None);
    }

    #[test]
    fn json_errors_convert() {
        let parse_error = serde_json::from_str::<u8>("nope").unwrap_err();
        let err: ShortcutError = parse_error.into();
        assert!(matches!(err, ShortcutError::Json(_)));
    }
}
