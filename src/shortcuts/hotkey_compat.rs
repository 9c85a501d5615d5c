//! Conversion between `Shortcut` and the `global-hotkey` crate's types.

use global_hotkey::hotkey::{HotKey, Modifiers as HotkeyModifiers};

use super::keys::key_to_code;
use super::types::{Modifiers, Shortcut};

/// Build the OS hotkey for a shortcut. None if the key has no physical code.
pub fn to_hotkey(shortcut: &Shortcut) -> Option<HotKey> {
    let code = key_to_code(&shortcut.key)?;
    Some(HotKey::new(Some(to_hotkey_modifiers(shortcut.modifiers)), code))
}

pub fn to_hotkey_modifiers(modifiers: Modifiers) -> HotkeyModifiers {
    let mut mods = HotkeyModifiers::empty();
    if modifiers.cmd {
        mods |= HotkeyModifiers::SUPER;
    }
    if modifiers.ctrl {
        mods |= HotkeyModifiers::CONTROL;
    }
    if modifiers.alt {
        mods |= HotkeyModifiers::ALT;
    }
    if modifiers.shift {
        mods |= HotkeyModifiers::SHIFT;
    }
    mods
}
