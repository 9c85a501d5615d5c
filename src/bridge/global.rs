//! `HotkeyBackend` over the `global-hotkey` crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{Error as HotkeyError, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{DeliveryMode, EventKind, EventSource, HotkeyBackend, OsEvent, OsEventSink};
use crate::error::{Result, ShortcutError};
use crate::logging;
use crate::shortcuts::{to_hotkey, Shortcut};

/// Format a hotkey registration error with helpful context
pub fn format_hotkey_error(e: &HotkeyError, shortcut_display: &str) -> String {
    match e {
        HotkeyError::AlreadyRegistered(hk) => format!(
            "'{}' is already registered by another application (ID: {})",
            shortcut_display,
            hk.id()
        ),
        HotkeyError::FailedToRegister(msg) => format!(
            "system rejected '{}': {}. The combination may be reserved by the OS",
            shortcut_display, msg
        ),
        HotkeyError::OsError(os_err) => {
            format!("OS error registering '{}': {}", shortcut_display, os_err)
        }
        other => format!("failed to register '{}': {}", shortcut_display, other),
    }
}

/// Turns raw `global-hotkey` events into `OsEvent`s.
///
/// `global-hotkey` has one event stream for both delivery modes, so events are tagged
/// with the source of whichever mode the bridge last switched to. Shared between the
/// backend and its listener thread.
#[derive(Clone, Default)]
pub(crate) struct EventRelay {
    by_id: Arc<RwLock<HashMap<u32, Shortcut>>>,
    menu_tracking: Arc<AtomicBool>,
}

impl EventRelay {
    pub(crate) fn insert(&self, id: u32, shortcut: Shortcut) {
        self.by_id.write().insert(id, shortcut);
    }

    pub(crate) fn remove(&self, id: u32) {
        self.by_id.write().remove(&id);
    }

    pub(crate) fn set_mode(&self, mode: DeliveryMode) {
        self.menu_tracking
            .store(mode == DeliveryMode::MenuTracking, Ordering::SeqCst);
    }

    pub(crate) fn translate(&self, event: GlobalHotKeyEvent) -> Option<OsEvent> {
        let Some(shortcut) = self.by_id.read().get(&event.id).cloned() else {
            debug!(id = event.id, "Ignoring event for unknown hotkey id");
            return None;
        };
        let source = if self.menu_tracking.load(Ordering::SeqCst) {
            EventSource::MenuTracking
        } else {
            EventSource::Standard
        };
        let kind = match event.state {
            HotKeyState::Pressed => EventKind::KeyDown,
            HotKeyState::Released => EventKind::KeyUp,
        };
        Some(OsEvent {
            source,
            shortcut,
            kind,
        })
    }
}

/// Registers shortcuts as system-wide hotkeys.
///
/// On macOS the manager must be created on the main thread, and on Windows the creating
/// thread must pump a message loop for events to arrive.
pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
    hotkeys: HashMap<Shortcut, HotKey>,
    relay: EventRelay,
    listener: Option<thread::JoinHandle<()>>,
}

impl GlobalHotkeyBackend {
    pub fn new() -> Result<Self> {
        let manager =
            GlobalHotKeyManager::new().map_err(|e| ShortcutError::Backend(e.to_string()))?;
        Ok(Self {
            manager,
            hotkeys: HashMap::new(),
            relay: EventRelay::default(),
            listener: None,
        })
    }

    pub fn registered_count(&self) -> usize {
        self.hotkeys.len()
    }

    fn listen(relay: EventRelay, sink: OsEventSink) {
        let receiver = GlobalHotKeyEvent::receiver();
        while let Ok(event) = receiver.recv() {
            let Some(event) = relay.translate(event) else {
                continue;
            };
            if !sink.deliver(event) {
                info!("Shortcut service gone, stopping hotkey listener");
                break;
            }
        }
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        let display = shortcut.display();
        let hotkey = to_hotkey(shortcut).ok_or_else(|| ShortcutError::RegistrationFailed {
            shortcut: display.clone(),
            message: format!("key '{}' has no physical key code", shortcut.key),
        })?;

        self.manager
            .register(hotkey)
            .map_err(|e| ShortcutError::RegistrationFailed {
                shortcut: display.clone(),
                message: format_hotkey_error(&e, &display),
            })?;

        self.relay.insert(hotkey.id(), shortcut.clone());
        self.hotkeys.insert(shortcut.clone(), hotkey);
        logging::log(
            "HOTKEY",
            &format!("Registered {} (id: {})", display, hotkey.id()),
        );
        Ok(())
    }

    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
        let Some(hotkey) = self.hotkeys.remove(shortcut) else {
            return Ok(());
        };
        self.relay.remove(hotkey.id());
        self.manager
            .unregister(hotkey)
            .map_err(|e| ShortcutError::RegistrationFailed {
                shortcut: shortcut.display(),
                message: e.to_string(),
            })?;
        logging::log("HOTKEY", &format!("Unregistered {}", shortcut.display()));
        Ok(())
    }

    fn start(&mut self, sink: OsEventSink) -> Result<()> {
        if self.listener.is_some() {
            warn!("Hotkey listener already started");
            return Ok(());
        }
        let relay = self.relay.clone();
        let handle = thread::Builder::new()
            .name("global-hotkey-listener".to_string())
            .spawn(move || Self::listen(relay, sink))
            .map_err(|e| ShortcutError::Backend(e.to_string()))?;
        self.listener = Some(handle);
        Ok(())
    }

    fn delivery_mode_changed(&mut self, mode: DeliveryMode) {
        self.relay.set_mode(mode);
    }
}

impl Drop for GlobalHotkeyBackend {
    fn drop(&mut self) {
        let hotkeys: Vec<HotKey> = self.hotkeys.drain().map(|(_, hotkey)| hotkey).collect();
        if !hotkeys.is_empty() {
            if let Err(e) = self.manager.unregister_all(&hotkeys) {
                warn!(error = %e, "Failed to unregister hotkeys on shutdown");
            }
        }
        // The listener blocks on a process-wide receiver; it exits on its next event
        self.listener.take();
    }
}
