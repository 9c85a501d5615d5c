//! Shortcut value types.
//!
//! This module provides:
//! - `Shortcut` / `Modifiers` - physical key combinations, parsing and display
//! - key vocabulary: canonical key names, aliases, labels and OS key codes
//! - `Name` - logical, application-declared shortcut slots with optional defaults
//! - Conversion to the OS hotkey types used by the bridge
//!
//! # Example
//!
//! ```ignore
//! use keyboard_shortcuts::shortcuts::{Name, Shortcut};
//!
//! let toggle = Name::with_default("toggleUnicornMode", Shortcut::parse("cmd+shift+u")?);
//! println!("Display: {}", toggle.default_shortcut().unwrap()); // Cmd+Shift+U
//! ```

mod hotkey_compat;
mod keys;
mod name;
mod types;


pub use types::{Modifiers, Shortcut, ShortcutParseError};

pub use name::Name;

pub use hotkey_compat::{to_hotkey, to_hotkey_modifiers};
pub use keys::{canonicalize_key, is_known_key, key_label, key_to_code};
