//! Key vocabulary shared by parsing, display and the OS hotkey mapping.
//!
//! A key is stored under one canonical lowercase name. Letters, digits and F1-F24 are
//! their own names; every other key is listed in `NAMED_KEYS` together with the
//! spellings accepted for it, its `global-hotkey` code and its display label.

use global_hotkey::hotkey::Code;

struct NamedKey {
    name: &'static str,
    code: Code,
    label: &'static str,
    aliases: &'static [&'static str],
}

const NAMED_KEYS: &[NamedKey] = &[
    NamedKey { name: "space", code: Code::Space, label: "Space", aliases: &[] },
    NamedKey { name: "enter", code: Code::Enter, label: "Enter", aliases: &["return"] },
    NamedKey { name: "tab", code: Code::Tab, label: "Tab", aliases: &[] },
    NamedKey { name: "escape", code: Code::Escape, label: "Esc", aliases: &["esc"] },
    NamedKey { name: "backspace", code: Code::Backspace, label: "Backspace", aliases: &["back"] },
    NamedKey { name: "delete", code: Code::Delete, label: "Delete", aliases: &["del"] },
    NamedKey { name: "up", code: Code::ArrowUp, label: "Up", aliases: &["arrowup", "uparrow"] },
    NamedKey {
        name: "down",
        code: Code::ArrowDown,
        label: "Down",
        aliases: &["arrowdown", "downarrow"],
    },
    NamedKey {
        name: "left",
        code: Code::ArrowLeft,
        label: "Left",
        aliases: &["arrowleft", "leftarrow"],
    },
    NamedKey {
        name: "right",
        code: Code::ArrowRight,
        label: "Right",
        aliases: &["arrowright", "rightarrow"],
    },
    NamedKey { name: "home", code: Code::Home, label: "Home", aliases: &[] },
    NamedKey { name: "end", code: Code::End, label: "End", aliases: &[] },
    NamedKey { name: "pageup", code: Code::PageUp, label: "PageUp", aliases: &["pgup"] },
    NamedKey {
        name: "pagedown",
        code: Code::PageDown,
        label: "PageDown",
        aliases: &["pgdn", "pgdown"],
    },
    NamedKey { name: "semicolon", code: Code::Semicolon, label: ";", aliases: &[";"] },
    NamedKey { name: "quote", code: Code::Quote, label: "'", aliases: &["'", "apostrophe"] },
    NamedKey { name: "comma", code: Code::Comma, label: ",", aliases: &[","] },
    NamedKey { name: "period", code: Code::Period, label: ".", aliases: &[".", "dot"] },
    NamedKey { name: "slash", code: Code::Slash, label: "/", aliases: &["/"] },
    NamedKey { name: "backslash", code: Code::Backslash, label: "\\", aliases: &["\\"] },
    NamedKey {
        name: "bracketleft",
        code: Code::BracketLeft,
        label: "[",
        aliases: &["[", "leftbracket"],
    },
    NamedKey {
        name: "bracketright",
        code: Code::BracketRight,
        label: "]",
        aliases: &["]", "rightbracket"],
    },
    NamedKey { name: "minus", code: Code::Minus, label: "-", aliases: &["-", "hyphen"] },
    NamedKey { name: "equal", code: Code::Equal, label: "=", aliases: &["=", "equals"] },
    NamedKey {
        name: "backquote",
        code: Code::Backquote,
        label: "`",
        aliases: &["`", "backtick", "grave"],
    },
];

fn named(key: &str) -> Option<&'static NamedKey> {
    NAMED_KEYS.iter().find(|k| k.name == key)
}

/// Lowercase a key and resolve accepted aliases (`esc`, `[`, `pgdn`...) to the
/// canonical name. Unknown keys are returned lowercased.
pub fn canonicalize_key(key: &str) -> String {
    let lower = key.to_lowercase();
    NAMED_KEYS
        .iter()
        .find(|k| k.aliases.contains(&lower.as_str()))
        .map_or(lower, |k| k.name.to_string())
}

/// Whether a canonical key name can be registered with the OS.
pub fn is_known_key(key: &str) -> bool {
    key_to_code(key).is_some()
}

/// Label used when showing a key to the user.
pub fn key_label(key: &str) -> String {
    named(key).map_or_else(|| key.to_uppercase(), |k| k.label.to_string())
}

/// Map a canonical key name to its physical key code.
pub fn key_to_code(key: &str) -> Option<Code> {
    let code = match key {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        "f13" => Code::F13,
        "f14" => Code::F14,
        "f15" => Code::F15,
        "f16" => Code::F16,
        "f17" => Code::F17,
        "f18" => Code::F18,
        "f19" => Code::F19,
        "f20" => Code::F20,
        "f21" => Code::F21,
        "f22" => Code::F22,
        "f23" => Code::F23,
        "f24" => Code::F24,
        other => return named(other).map(|k| k.code),
    };
    Some(code)
}
