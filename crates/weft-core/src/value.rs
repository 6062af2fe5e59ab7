#![forbid(unsafe_code)]

//! Dynamic values that references compute over.
//!
//! [`Value`] is deliberately loose: templates read paths off whatever shape
//! they are handed, and those reads must be total. Reading a property of
//! something that is not dictionary-like yields [`Value::Undefined`]; writing
//! to it is ignored.
//!
//! [`Object`] is the one mutable shape. Every property has its own lazily
//! created [`Tag`]: [`Object::get`] consumes it and [`Object::set`] dirties it
//! when the stored value actually changes. This is the get/set property hook
//! the reference layer is built on.
//!
//! `Array` and `Object` have identity; two handles are [`Value::same`] only
//! when they point at the same allocation.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHashMap;

use crate::tag::{Tag, consume_tag, create_tag, dirty_tag};

/// A dynamically shaped value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Shorthand for a string value.
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Whether properties can be read off this value.
    #[must_use]
    pub fn is_dict(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read a property. Total over every shape.
    ///
    /// Objects consume the property's tag. Arrays answer `length` and numeric
    /// indices. Everything else yields `Undefined`.
    #[must_use]
    pub fn get_prop(&self, key: &str) -> Value {
        match self {
            Self::Object(obj) => obj.get(key),
            Self::Array(arr) => {
                if key == "length" {
                    Value::Number(arr.len() as f64)
                } else {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|index| arr.get(index).cloned())
                        .unwrap_or_default()
                }
            }
            _ => Value::Undefined,
        }
    }

    /// Write a property. Only objects accept writes; returns whether the
    /// write was applied.
    pub fn set_prop(&self, key: &str, value: Value) -> bool {
        match self {
            Self::Object(obj) => {
                obj.set(key, value);
                true
            }
            _ => false,
        }
    }

    /// Identity for arrays and objects, value equality for primitives.
    ///
    /// Numbers follow strict equality except that `NaN` is the same as
    /// itself, so a `NaN` item does not look changed on every pass.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Template truthiness: `false`, `0`, `NaN`, `""`, `null` and
    /// `undefined` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// String form used for list keys.
    ///
    /// Strings hand back their own allocation, so keys derived from the same
    /// string value share storage.
    #[must_use]
    pub fn to_key_string(&self) -> Rc<str> {
        match self {
            Self::Str(s) => Rc::clone(s),
            other => Rc::from(other.to_string()),
        }
    }

    /// Items to iterate, or `None` when the value is not iterable.
    ///
    /// `undefined` and `null` iterate as empty. Strings iterate their
    /// characters.
    #[must_use]
    pub fn iter_items(&self) -> Option<Vec<Value>> {
        match self {
            Self::Undefined | Self::Null => Some(Vec::new()),
            Self::Array(arr) => Some(arr.iter().cloned().collect()),
            Self::Str(s) => Some(
                s.chars()
                    .map(|c| Value::Str(Rc::from(c.encode_utf8(&mut [0; 4]) as &str)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{n:.0}")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => format_number(*n, f),
            Self::Str(s) => f.write_str(s),
            Self::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(&&**s).finish(),
            Self::Array(arr) => fmt::Debug::fmt(arr, f),
            Self::Object(obj) => fmt::Debug::fmt(obj, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Self::Array(arr)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Self::Object(obj)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(Array::new(items.into_iter().map(Into::into)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

/// Immutable, shared sequence of values.
#[derive(Clone)]
pub struct Array {
    items: Rc<[Value]>,
}

impl Array {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.items).cast::<u8>() as usize
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ObjectInner {
    props: RefCell<AHashMap<Rc<str>, Value>>,
    tags: RefCell<AHashMap<Rc<str>, Tag>>,
}

/// Shared, mutable property bag with per-property change tracking.
///
/// Cloning an `Object` yields another handle to the **same** bag.
#[derive(Clone, Default)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert that does not touch any tag.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.inner
            .props
            .borrow_mut()
            .insert(Rc::from(key), value.into());
        self
    }

    /// Tracked read: consumes the property's tag.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        consume_tag(&self.tag_for(key));
        self.peek(key)
    }

    /// Untracked read.
    #[must_use]
    pub fn peek(&self, key: &str) -> Value {
        self.inner
            .props
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Store `value`, dirtying the property's tag if the value changed.
    pub fn set(&self, key: &str, value: Value) {
        let changed = {
            let mut props = self.inner.props.borrow_mut();
            let changed = props.get(key).is_none_or(|old| !old.same(&value));
            props.insert(Rc::from(key), value);
            changed
        };
        if changed {
            dirty_tag(&self.tag_for(key));
        }
    }

    /// The tag guarding `key`, created on first use.
    #[must_use]
    pub fn tag_for(&self, key: &str) -> Tag {
        let mut tags = self.inner.tags.borrow_mut();
        if let Some(tag) = tags.get(key) {
            return tag.clone();
        }
        let tag = create_tag();
        tags.insert(Rc::from(key), tag.clone());
        tag
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.props.borrow().is_empty()
    }

    /// Property names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<_> = self.inner.props.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self.inner.props.borrow();
        let mut map = f.debug_map();
        for key in self.keys() {
            map.entry(&&*key, &props[&key]);
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// IdentityKey
// ---------------------------------------------------------------------------

/// A value hashed and compared by [`Value::same`].
///
/// Holding the value keeps the allocation alive, so an address can never be
/// reused by a different object while the key exists.
#[derive(Clone, Debug)]
pub struct IdentityKey(pub Value);

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same(&other.0)
    }
}

impl Eq for IdentityKey {}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                let canonical = if *n == 0.0 {
                    0.0f64
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                canonical.to_bits().hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Array(arr) => {
                5u8.hash(state);
                arr.addr().hash(state);
            }
            Value::Object(obj) => {
                6u8.hash(state);
                obj.addr().hash(state);
            }
        }
    }
}
