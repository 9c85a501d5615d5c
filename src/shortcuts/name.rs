//! Logical shortcut slots.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::types::Shortcut;

/// Identifier of an application-defined shortcut slot, e.g. `toggleUnicornMode`.
///
/// Declared once per feature and immutable afterwards. Equality and hashing only look at
/// the raw name, so a `Name` rebuilt from a store key compares equal to the declared one.
#[derive(Clone)]
pub struct Name {
    raw: Arc<str>,
    default_shortcut: Option<Shortcut>,
}

impl Name {
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self {
            raw: raw.into(),
            default_shortcut: None,
        }
    }

    pub fn with_default(raw: impl Into<Arc<str>>, default_shortcut: Shortcut) -> Self {
        Self {
            raw: raw.into(),
            default_shortcut: Some(default_shortcut),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn default_shortcut(&self) -> Option<&Shortcut> {
        self.default_shortcut.as_ref()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default_shortcut {
            Some(default) => write!(
                f,
                "Name({}, default: {})",
                self.raw,
                default.to_canonical_string()
            ),
            None => write!(f, "Name({})", self.raw),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
