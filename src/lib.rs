//! Keyboard Shortcuts - user-customizable global keyboard shortcuts
//!
//! Applications declare named shortcut slots (`Name`), users assign key combinations
//! to them, and the crate keeps OS-level hotkey registrations in step with the
//! persisted configuration and the listeners that care about each name.
//!
//! # Module Structure
//!
//! - `shortcuts` - `Shortcut`, `Modifiers`, `Name`
//! - `store` - persisted configuration and change observation
//! - `bridge` - OS hotkey registration and the menu-tracking delivery state machine
//! - `registry` - the single-owned `ShortcutRegistry`
//! - `service` - owner thread and the cloneable `KeyboardShortcuts` handle
//! - `menu` - menu-tracking adapter
//! - `config`, `logging`, `error` - ambient plumbing

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod registry;
pub mod service;
pub mod shortcuts;
pub mod store;

pub use bridge::EventKind;
pub use error::{Result, ShortcutError};
pub use menu::MenuTracker;
pub use registry::{ListenerId, ShortcutEvent, ShortcutRegistry};
pub use service::{EventSubscription, KeyboardShortcuts, ServiceBuilder};
pub use shortcuts::{Modifiers, Name, Shortcut};
