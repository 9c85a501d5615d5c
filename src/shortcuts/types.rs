//! `Shortcut` and `Modifiers`: a physical key combination, its parser and its
//! persisted encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::keys::{canonicalize_key, is_known_key, key_label};

/// Errors that can occur when parsing a shortcut string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortcutParseError {
    #[error("shortcut string is empty")]
    Empty,
    #[error("shortcut has no key, only modifiers")]
    MissingKey,
    #[error("unknown token '{0}' in shortcut")]
    UnknownToken(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// Modifier keys for a shortcut.
///
/// `cmd` is Command on macOS and the Super/Windows key elsewhere; it maps to
/// `global-hotkey`'s `SUPER`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub cmd: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
}

impl Modifiers {
    pub fn cmd() -> Self {
        Self {
            cmd: true,
            ..Default::default()
        }
    }

    /// The flag a modifier token in a shortcut string sets, if it is one.
    fn slot(&mut self, token: &str) -> Option<&mut bool> {
        match token {
            "cmd" | "command" | "meta" | "super" | "win" => Some(&mut self.cmd),
            "ctrl" | "control" | "ctl" => Some(&mut self.ctrl),
            "alt" | "opt" | "option" => Some(&mut self.alt),
            "shift" => Some(&mut self.shift),
            _ => None,
        }
    }

    /// (held, canonical name, label), in canonical order.
    fn flags(&self) -> [(bool, &'static str, &'static str); 4] {
        [
            (self.alt, "alt", "Alt"),
            (self.cmd, "cmd", "Cmd"),
            (self.ctrl, "ctrl", "Ctrl"),
            (self.shift, "shift", "Shift"),
        ]
    }
}

/// A physical key combination: a canonical key name plus a modifier set.
///
/// Two shortcuts are equal iff key and modifiers match exactly. The serde form is the
/// persisted encoding: `{"key":"u","modifiers":{"cmd":true,...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shortcut {
    pub key: String,
    pub modifiers: Modifiers,
}

impl Shortcut {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: canonicalize_key(&key.into()),
            modifiers,
        }
    }

    /// Parse `cmd+shift+u`, `Command Option Return` and similar. Tokens are separated
    /// by `+` or whitespace; exactly one token must be a key.
    pub fn parse(s: &str) -> Result<Self, ShortcutParseError> {
        let mut modifiers = Modifiers::default();
        let mut key: Option<&str> = None;

        for token in s.split(|c: char| c == '+' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            if let Some(flag) = modifiers.slot(&token.to_lowercase()) {
                *flag = true;
            } else if key.replace(token).is_some() {
                return Err(ShortcutParseError::UnknownToken(token.to_string()));
            }
        }

        let key = match key {
            Some(key) => key,
            None if modifiers == Modifiers::default() => return Err(ShortcutParseError::Empty),
            None => return Err(ShortcutParseError::MissingKey),
        };
        let shortcut = Shortcut::new(key, modifiers);
        if !shortcut.is_valid() {
            return Err(ShortcutParseError::UnknownKey(key.to_string()));
        }
        Ok(shortcut)
    }

    /// Whether the key names something the OS bridge can register.
    pub fn is_valid(&self) -> bool {
        is_known_key(&self.key)
    }

    /// Textual encoding used by the settings store.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the settings-store encoding. Returns None for anything that is not a
    /// well-formed shortcut with a known key.
    pub fn from_json(encoded: &str) -> Option<Self> {
        let decoded: Shortcut = serde_json::from_str(encoded).ok()?;
        let shortcut = Shortcut::new(decoded.key, decoded.modifiers);
        shortcut.is_valid().then_some(shortcut)
    }

    /// User-facing form, e.g. `Cmd+Shift+U`.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self
            .modifiers
            .flags()
            .iter()
            .filter(|(held, _, _)| *held)
            .map(|(_, _, label)| label.to_string())
            .collect();
        parts.push(key_label(&self.key));
        parts.join("+")
    }

    /// Stable `alt+cmd+ctrl+shift+key` form, parseable by `Shortcut::parse`.
    pub fn to_canonical_string(&self) -> String {
        let mut parts: Vec<&str> = self
            .modifiers
            .flags()
            .iter()
            .filter(|(held, _, _)| *held)
            .map(|(_, name, _)| *name)
            .collect();
        parts.push(&self.key);
        parts.join("+")
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
