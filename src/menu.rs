//! Menu-tracking adapter.
//!
//! While an application menu is open the OS routes key events through menu tracking,
//! so the bridge has to listen on a different mechanism. Hosts forward their
//! menu-open and menu-close notifications here; only real transitions reach the
//! service.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::service::KeyboardShortcuts;

pub struct MenuTracker {
    open: AtomicBool,
    shortcuts: KeyboardShortcuts,
}

impl MenuTracker {
    pub fn new(shortcuts: KeyboardShortcuts) -> Self {
        Self {
            open: AtomicBool::new(false),
            shortcuts,
        }
    }

    pub fn menu_did_open(&self) {
        self.set_open(true);
    }

    pub fn menu_did_close(&self) {
        self.set_open(false);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn set_open(&self, open: bool) {
        if self.open.swap(open, Ordering::SeqCst) == open {
            debug!(open, "Menu state unchanged");
            return;
        }
        self.shortcuts.set_menu_open(open);
    }
}
