#![forbid(unsafe_code)]

//! List keys.

use std::fmt;
use std::rc::Rc;

use weft_core::{IdentityKey, Value};

/// How a list derives the key of each source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPath {
    /// `@index`: the item's position in the source, holes included.
    Index,
    /// `@identity`: the item itself, compared by identity.
    Identity,
    /// Any other string: the named property of the item.
    Path(Rc<str>),
}

impl KeyPath {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "@index" => KeyPath::Index,
            "@identity" => KeyPath::Identity,
            path => KeyPath::Path(Rc::from(path)),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(raw: &str) -> Self {
        KeyPath::parse(raw)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Index => f.write_str("@index"),
            KeyPath::Identity => f.write_str("@identity"),
            KeyPath::Path(path) => f.write_str(path),
        }
    }
}

/// Key of one list item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// String key from `@index` or a key path.
    Named(Rc<str>),
    /// The item value itself.
    Identity(IdentityKey),
}

impl ItemKey {
    /// The string form, if this is a named key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ItemKey::Named(name) => Some(name),
            ItemKey::Identity(_) => None,
        }
    }
}

impl From<&str> for ItemKey {
    fn from(name: &str) -> Self {
        ItemKey::Named(Rc::from(name))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Named(name) => f.write_str(name),
            ItemKey::Identity(IdentityKey(value)) => write!(f, "{value:?}"),
        }
    }
}

/// Derives item keys for one pass.
pub(crate) struct KeyFor<'a> {
    pub(crate) path: &'a KeyPath,
    pub(crate) get_path: &'a dyn Fn(&Value, &str) -> Value,
}

impl KeyFor<'_> {
    pub(crate) fn key(&self, item: &Value, index: usize) -> ItemKey {
        match self.path {
            KeyPath::Index => ItemKey::Named(Rc::from(index.to_string())),
            KeyPath::Identity => ItemKey::Identity(IdentityKey(item.clone())),
            KeyPath::Path(path) => ItemKey::Named((self.get_path)(item, path).to_key_string()),
        }
    }
}
