//! OS hotkey bridge.
//!
//! `HotkeyBridge` sits between the registry and a `HotkeyBackend` (the OS seam):
//! - coalesces duplicate registrations (registering twice is an OS-level no-op)
//! - tolerates unregistering something never registered
//! - filters incoming key events through the delivery-mode state machine
//!
//! # Delivery modes
//!
//! While an application menu is being tracked the OS blocks the standard hotkey
//! mechanism, so key events arrive through an alternate monitor instead. The bridge is
//! always in exactly one of two modes:
//!
//! ```text
//!            set_menu_open(true)
//!  Standard ───────────────────────▶ MenuTracking
//!     ▲                                   │
//!     └───────────────────────────────────┘
//!            set_menu_open(false)
//! ```
//!
//! Only events from the active mode's `EventSource` are accepted, so the two mechanisms
//! never double-fire. A key that was down when the mode switched still gets exactly one
//! key-up, from whichever source reports it first: a release taken from the inactive
//! source swallows the matching release from the active one.
//!
//! Backends that have a single event stream (such as `GlobalHotkeyBackend`) tag each
//! event with the source of the current mode, which they learn through
//! `HotkeyBackend::delivery_mode_changed`.

mod global;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::shortcuts::Shortcut;

pub use global::{format_hotkey_error, GlobalHotkeyBackend};

#[cfg(test)]
pub(crate) use global::EventRelay;

/// Key transition delivered for a registered shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
}

/// Mechanism an OS event arrived through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Background global-hotkey registration.
    Standard,
    /// Event monitor that stays live while a menu is tracking.
    MenuTracking,
}

/// Which `EventSource` the bridge currently listens to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    #[default]
    Standard,
    MenuTracking,
}

impl DeliveryMode {
    pub fn source(self) -> EventSource {
        match self {
            DeliveryMode::Standard => EventSource::Standard,
            DeliveryMode::MenuTracking => EventSource::MenuTracking,
        }
    }
}

/// A key event as reported by the OS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsEvent {
    pub source: EventSource,
    pub shortcut: Shortcut,
    pub kind: EventKind,
}

/// Where backends push OS events. Forwards onto the registry's owner context.
#[derive(Clone)]
pub struct OsEventSink {
    deliver: Arc<dyn Fn(OsEvent) -> bool + Send + Sync>,
}

impl OsEventSink {
    pub fn new(deliver: impl Fn(OsEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Returns false once the receiving side is gone.
    pub fn deliver(&self, event: OsEvent) -> bool {
        (self.deliver)(event)
    }
}

/// The OS-facing half of the bridge.
pub trait HotkeyBackend: Send {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()>;
    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()>;

    /// Begin pushing OS events into `sink`. Called once, before any registration.
    fn start(&mut self, _sink: OsEventSink) -> Result<()> {
        Ok(())
    }

    /// Notification that the bridge switched delivery mode.
    fn delivery_mode_changed(&mut self, _mode: DeliveryMode) {}
}

/// Backend that registers nothing with the OS. Events can still be injected through the
/// sink, e.g. by an application-level key monitor.
#[derive(Debug, Default)]
pub struct HeadlessBackend;

impl HotkeyBackend for HeadlessBackend {
    fn register(&mut self, _shortcut: &Shortcut) -> Result<()> {
        Ok(())
    }

    fn unregister(&mut self, _shortcut: &Shortcut) -> Result<()> {
        Ok(())
    }
}

pub struct HotkeyBridge {
    backend: Box<dyn HotkeyBackend>,
    registered: HashSet<Shortcut>,
    pressed: HashSet<Shortcut>,
    /// Released through the inactive source; the active source's key-up is a duplicate.
    released_inactive: HashSet<Shortcut>,
    mode: DeliveryMode,
}

impl HotkeyBridge {
    pub fn new(backend: Box<dyn HotkeyBackend>) -> Self {
        Self {
            backend,
            registered: HashSet::new(),
            pressed: HashSet::new(),
            released_inactive: HashSet::new(),
            mode: DeliveryMode::Standard,
        }
    }

    pub fn start(&mut self, sink: OsEventSink) -> Result<()> {
        self.backend.start(sink)
    }

    /// Register with the OS. Already-registered shortcuts are a no-op.
    pub fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        if self.registered.contains(shortcut) {
            return Ok(());
        }
        self.backend.register(shortcut)?;
        self.registered.insert(shortcut.clone());
        debug!(shortcut = %shortcut.to_canonical_string(), "Hotkey registered");
        Ok(())
    }

    /// Remove the OS registration. Unknown shortcuts are a no-op.
    pub fn unregister(&mut self, shortcut: &Shortcut) {
        if !self.registered.remove(shortcut) {
            return;
        }
        self.pressed.remove(shortcut);
        self.released_inactive.remove(shortcut);
        if let Err(e) = self.backend.unregister(shortcut) {
            // Internal tracking is already updated
            warn!(
                error = %e,
                shortcut = %shortcut.to_canonical_string(),
                "Failed to unregister hotkey"
            );
        }
        debug!(shortcut = %shortcut.to_canonical_string(), "Hotkey unregistered");
    }

    /// Drop every OS registration. Teardown only.
    pub fn unregister_all(&mut self) {
        let all: Vec<Shortcut> = self.registered.iter().cloned().collect();
        for shortcut in &all {
            self.unregister(shortcut);
        }
        info!(count = all.len(), "Unregistered all hotkeys");
    }

    pub fn is_registered(&self, shortcut: &Shortcut) -> bool {
        self.registered.contains(shortcut)
    }

    pub fn registered(&self) -> Vec<Shortcut> {
        self.registered.iter().cloned().collect()
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Single transition trigger of the delivery state machine. Returns whether the
    /// mode changed.
    pub fn set_menu_open(&mut self, open: bool) -> bool {
        let next = if open {
            DeliveryMode::MenuTracking
        } else {
            DeliveryMode::Standard
        };
        if next == self.mode {
            return false;
        }
        self.mode = next;
        self.backend.delivery_mode_changed(next);
        info!(mode = ?next, pressed = self.pressed.len(), "Hotkey delivery mode switched");
        true
    }

    /// Decide whether an OS event should be dispatched.
    pub fn accept(&mut self, event: &OsEvent) -> Option<EventKind> {
        if !self.registered.contains(&event.shortcut) {
            return None;
        }
        let shortcut = &event.shortcut;
        let from_active = event.source == self.mode.source();
        match event.kind {
            EventKind::KeyDown if from_active => {
                self.released_inactive.remove(shortcut);
                self.pressed.insert(shortcut.clone());
                Some(EventKind::KeyDown)
            }
            EventKind::KeyDown => None,
            EventKind::KeyUp if self.pressed.remove(shortcut) => {
                if !from_active {
                    self.released_inactive.insert(shortcut.clone());
                }
                Some(EventKind::KeyUp)
            }
            EventKind::KeyUp if from_active && self.released_inactive.remove(shortcut) => {
                debug!(shortcut = %shortcut, "Dropping duplicate key-up after mode switch");
                None
            }
            EventKind::KeyUp if from_active => Some(EventKind::KeyUp),
            EventKind::KeyUp => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShortcutError;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct CountingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        reject: Option<Shortcut>,
    }

    impl HotkeyBackend for CountingBackend {
        fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
            if self.reject.as_ref() == Some(shortcut) {
                return Err(ShortcutError::RegistrationFailed {
                    shortcut: shortcut.to_canonical_string(),
                    message: "taken".to_string(),
                });
            }
            self.calls
                .lock()
                .push(format!("register {}", shortcut.to_canonical_string()));
            Ok(())
        }

        fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
            self.calls
                .lock()
                .push(format!("unregister {}", shortcut.to_canonical_string()));
            Ok(())
        }
    }

    fn cmd_u() -> Shortcut {
        Shortcut::parse("cmd+u").unwrap()
    }

    fn event(source: EventSource, kind: EventKind) -> OsEvent {
        OsEvent {
            source,
            shortcut: cmd_u(),
            kind,
        }
    }

    #[test]
    fn duplicate_registration_reaches_os_once() {
        let backend = CountingBackend::default();
        let calls = backend.calls.clone();
        let mut bridge = HotkeyBridge::new(Box::new(backend));

        bridge.register(&cmd_u()).unwrap();
        bridge.register(&cmd_u()).unwrap();
        bridge.unregister(&cmd_u());
        bridge.unregister(&cmd_u());

        assert_eq!(
            *calls.lock(),
            vec!["register cmd+u".to_string(), "unregister cmd+u".to_string()]
        );
    }

    #[test]
    fn failed_registration_is_not_tracked() {
        let backend = CountingBackend {
            reject: Some(cmd_u()),
            ..Default::default()
        };
        let mut bridge = HotkeyBridge::new(Box::new(backend));
        assert!(bridge.register(&cmd_u()).is_err());
        assert!(!bridge.is_registered(&cmd_u()));
    }

    #[test]
    fn unregister_all_clears_everything() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        bridge.register(&cmd_u()).unwrap();
        bridge.register(&Shortcut::parse("ctrl+f5").unwrap()).unwrap();
        bridge.unregister_all();
        assert!(bridge.registered().is_empty());
    }

    #[test]
    fn events_for_unregistered_shortcuts_are_dropped() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyDown)),
            None
        );
    }

    #[test]
    fn only_active_source_is_accepted() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        bridge.register(&cmd_u()).unwrap();

        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyDown)),
            None
        );
        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyDown)),
            Some(EventKind::KeyDown)
        );

        assert!(bridge.set_menu_open(true));
        assert!(!bridge.set_menu_open(true));
        assert_eq!(bridge.mode(), DeliveryMode::MenuTracking);
    }

    #[test]
    fn key_held_across_switch_is_released_exactly_once() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        bridge.register(&cmd_u()).unwrap();

        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyDown)),
            Some(EventKind::KeyDown)
        );
        bridge.set_menu_open(true);

        // Release reported by the menu-tracking monitor
        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyUp)),
            Some(EventKind::KeyUp)
        );
        // Late duplicate from the blocked standard mechanism
        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyUp)),
            None
        );
    }

    #[test]
    fn inactive_source_reporting_release_first_still_releases_once() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        bridge.register(&cmd_u()).unwrap();

        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyDown)),
            Some(EventKind::KeyDown)
        );
        bridge.set_menu_open(true);

        // The standard mechanism delivers the release before the monitor does
        assert_eq!(
            bridge.accept(&event(EventSource::Standard, EventKind::KeyUp)),
            Some(EventKind::KeyUp)
        );
        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyUp)),
            None
        );

        // The next press and release go through normally
        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyDown)),
            Some(EventKind::KeyDown)
        );
        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyUp)),
            Some(EventKind::KeyUp)
        );
    }

    #[test]
    fn every_release_order_across_a_switch_yields_one_key_up() {
        let orders = [
            [EventSource::Standard, EventSource::MenuTracking],
            [EventSource::MenuTracking, EventSource::Standard],
        ];
        for order in orders {
            let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
            bridge.register(&cmd_u()).unwrap();
            bridge.accept(&event(EventSource::Standard, EventKind::KeyDown));
            bridge.set_menu_open(true);

            let key_ups = order
                .iter()
                .filter_map(|source| bridge.accept(&event(*source, EventKind::KeyUp)))
                .count();
            assert_eq!(key_ups, 1, "release order {:?}", order);
        }
    }

    #[test]
    fn release_from_previous_source_after_switch_back() {
        let mut bridge = HotkeyBridge::new(Box::new(HeadlessBackend));
        bridge.register(&cmd_u()).unwrap();
        bridge.set_menu_open(true);

        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyDown)),
            Some(EventKind::KeyDown)
        );
        bridge.set_menu_open(false);
        assert_eq!(
            bridge.accept(&event(EventSource::MenuTracking, EventKind::KeyUp)),
            Some(EventKind::KeyUp)
        );
    }
}
