#![forbid(unsafe_code)]

//! Memoized path references.
//!
//! Every value a template touches is a [`PathRef`]: `this`, `this.user.name`,
//! the result of a helper, the `item` of an `each` loop. References form
//! chains through [`PathRef::get`] and compute lazily.
//!
//! # Caching
//!
//! A cached reference stores its last value together with the tags it
//! consumed and the clock snapshot taken right after computing. It recomputes
//! iff it never computed or one of those tags moved past the snapshot.
//! Cache hits and recomputes both re-consume the dependencies into the
//! enclosing tracking frame, so invalidation is transitive through chains.
//!
//! # Invariants
//!
//! 1. With no intervening dirty of a consumed tag, two `value()` calls return
//!    [`Value::same`] results and the compute step runs once.
//! 2. Const references compute once and never consult tags again.
//! 3. Under [`ChildPolicy::Memoized`], `get(key)` returns the same child for
//!    the same key for as long as anyone holds that child.
//!
//! # Ownership
//!
//! A child owns its parent (a property chain must outlive the caller's
//! handle on the root), so the parent's child map holds only weak entries.
//! Strong entries in both directions would be an `Rc` cycle that is never
//! freed. The cost is that `root.get("a").value()` with no handle kept in
//! between builds a fresh child on each call; callers that read a path
//! repeatedly keep the child, as [`crate::ListManager`] keeps its array.
//!
//! # Failure Modes
//!
//! - **Non-object parent**: reads yield `Undefined`, writes are dropped.
//! - **Self-read while computing**: a dependency cycle. [`PathRef::try_value`]
//!   reports [`ReferenceError::Cycle`]; [`PathRef::value`] panics.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use weft_core::{
    Dependencies, Revision, Tag, Value, consume_tag, create_tag, current_revision, dirty_tag,
    track, untrack,
};

use crate::config::ChildPolicy;
use crate::error::ReferenceError;

/// Hook turning a value into a condition.
pub type ToBool = Rc<dyn Fn(&Value) -> bool>;

type Compute = Box<dyn Fn() -> Value>;

enum Kind {
    /// Roots whose value never changes (`this`, literals, the undefined ref).
    Const(Value),
    Helper { compute: Compute, constant: bool },
    Property { parent: PathRef, key: Rc<str> },
    IterationItem { tag: Tag, item: RefCell<Value> },
    Conditional { inner: PathRef, to_bool: ToBool },
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::Const(_) => "const",
            Kind::Helper { .. } => "helper",
            Kind::Property { .. } => "property",
            Kind::IterationItem { .. } => "iteration-item",
            Kind::Conditional { .. } => "conditional",
        }
    }
}

struct Cached {
    value: Value,
    deps: Dependencies,
    snapshot: Revision,
}

struct RefInner {
    kind: Kind,
    policy: ChildPolicy,
    label: Option<Rc<str>>,
    cache: RefCell<Option<Cached>>,
    computing: Cell<bool>,
    /// Held weakly: children point at their parent, so strong links both
    /// ways would leak every chain.
    children: RefCell<AHashMap<Rc<str>, Weak<RefInner>>>,
}

/// Shared handle to a reference.
///
/// Cloning a `PathRef` yields another handle to the **same** reference.
#[derive(Clone)]
pub struct PathRef {
    inner: Rc<RefInner>,
}

thread_local! {
    static UNDEFINED: PathRef = PathRef::from_kind(
        Kind::Const(Value::Undefined),
        ChildPolicy::Memoized,
        None,
    );
}

struct ComputingGuard<'a>(&'a Cell<bool>);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl PathRef {
    fn from_kind(kind: Kind, policy: ChildPolicy, label: Option<Rc<str>>) -> Self {
        Self {
            inner: Rc::new(RefInner {
                kind,
                policy,
                label,
                cache: RefCell::new(None),
                computing: Cell::new(false),
                children: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// Constant root for a component instance (the `this` of a template).
    #[must_use]
    pub fn root(value: Value, policy: ChildPolicy) -> Self {
        let label = policy.labels().then(|| Rc::from("this"));
        Self::from_kind(Kind::Const(value), policy, label)
    }

    /// Constant reference without a debug label.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self::from_kind(Kind::Const(value), ChildPolicy::Memoized, None)
    }

    /// The shared reference to `undefined`.
    #[must_use]
    pub fn undefined() -> Self {
        UNDEFINED.with(Clone::clone)
    }

    /// Root backed by a helper function, recomputed when anything it read
    /// changes.
    pub fn helper(name: &str, policy: ChildPolicy, compute: impl Fn() -> Value + 'static) -> Self {
        Self::helper_with(name, policy, Box::new(compute), false)
    }

    /// Root backed by a helper function whose result never changes.
    pub fn const_helper(
        name: &str,
        policy: ChildPolicy,
        compute: impl Fn() -> Value + 'static,
    ) -> Self {
        Self::helper_with(name, policy, Box::new(compute), true)
    }

    fn helper_with(name: &str, policy: ChildPolicy, compute: Compute, constant: bool) -> Self {
        let label = policy
            .labels()
            .then(|| Rc::from(format!("(result of a `{name}` helper)")));
        Self::from_kind(Kind::Helper { compute, constant }, policy, label)
    }

    /// Per-item reference owned by a list reconciler.
    pub fn iteration_item(parent: &PathRef, value: Value, key: impl fmt::Display) -> Self {
        let policy = parent.inner.policy;
        let label = policy
            .labels()
            .then(|| Rc::from(format!("{}.{key}", parent.label_or_empty())));
        Self::from_kind(
            Kind::IterationItem {
                tag: create_tag(),
                item: RefCell::new(value),
            },
            policy,
            label,
        )
    }

    /// Boolean view of `inner` through `to_bool`.
    #[must_use]
    pub fn conditional(inner: &PathRef, to_bool: ToBool) -> Self {
        let label = inner.inner.label.clone();
        Self::from_kind(
            Kind::Conditional {
                inner: inner.clone(),
                to_bool,
            },
            inner.inner.policy,
            label,
        )
    }

    fn property(&self, key: &str) -> Self {
        let label = self
            .inner
            .policy
            .labels()
            .then(|| Rc::from(format!("{}.{key}", self.label_or_empty())));
        Self::from_kind(
            Kind::Property {
                parent: self.clone(),
                key: Rc::from(key),
            },
            self.inner.policy,
            label,
        )
    }

    fn label_or_empty(&self) -> &str {
        self.inner.label.as_deref().unwrap_or("")
    }

    /// Debug label, recorded only under [`ChildPolicy::Unique`].
    #[must_use]
    pub fn debug_label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    #[must_use]
    pub fn policy(&self) -> ChildPolicy {
        self.inner.policy
    }

    /// Whether both handles point at the same reference.
    #[must_use]
    pub fn ptr_eq(&self, other: &PathRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the value can never change.
    #[must_use]
    pub fn is_const(&self) -> bool {
        match &self.inner.kind {
            Kind::Const(_) => true,
            Kind::Helper { constant, .. } => *constant,
            Kind::Conditional { inner, .. } => inner.is_const(),
            Kind::Property { .. } | Kind::IterationItem { .. } => false,
        }
    }

    /// Child reference for property `key`.
    ///
    /// Under [`ChildPolicy::Memoized`] the same key yields the same child
    /// while it is alive; under [`ChildPolicy::Unique`] every call builds a
    /// fresh, labelled child.
    #[must_use]
    pub fn get(&self, key: &str) -> PathRef {
        if self.inner.policy == ChildPolicy::Unique {
            return self.property(key);
        }
        if let Some(child) = self
            .inner
            .children
            .borrow()
            .get(key)
            .and_then(Weak::upgrade)
        {
            return PathRef { inner: child };
        }
        let child = self.property(key);
        let mut children = self.inner.children.borrow_mut();
        children.retain(|_, weak| weak.strong_count() > 0);
        children.insert(Rc::from(key), Rc::downgrade(&child.inner));
        child
    }

    /// Current value, recomputing only if something it read has changed.
    ///
    /// # Panics
    ///
    /// Panics on a dependency cycle (see [`PathRef::try_value`]).
    #[must_use]
    pub fn value(&self) -> Value {
        match self.try_value() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Current value, or [`ReferenceError::Cycle`] when this reference is
    /// read while it is itself computing.
    pub fn try_value(&self) -> Result<Value, ReferenceError> {
        match &self.inner.kind {
            Kind::Const(value) => Ok(value.clone()),
            Kind::IterationItem { tag, item } => {
                consume_tag(tag);
                Ok(item.borrow().clone())
            }
            Kind::Helper { .. } | Kind::Property { .. } | Kind::Conditional { .. } => {
                self.cached_value()
            }
        }
    }

    fn cache_hit(&self) -> Option<Value> {
        let cache = self.inner.cache.borrow();
        let cached = cache.as_ref()?;
        if self.is_const() || cached.deps.validate(cached.snapshot) {
            cached.deps.consume();
            Some(cached.value.clone())
        } else {
            None
        }
    }

    fn cached_value(&self) -> Result<Value, ReferenceError> {
        if let Some(value) = self.cache_hit() {
            return Ok(value);
        }
        if self.inner.computing.replace(true) {
            return Err(ReferenceError::Cycle {
                label: self.debug_label().unwrap_or("<anonymous>").to_owned(),
            });
        }
        let guard = ComputingGuard(&self.inner.computing);
        let (result, deps) = if self.is_const() {
            (untrack(|| self.compute()), Dependencies::default())
        } else {
            track(|| self.compute())
        };
        drop(guard);
        let value = result?;
        let snapshot = current_revision();
        deps.consume();
        tracing::trace!(
            message = "reference.compute",
            kind = self.inner.kind.name(),
            deps = deps.len(),
            snapshot
        );
        *self.inner.cache.borrow_mut() = Some(Cached {
            value: value.clone(),
            deps,
            snapshot,
        });
        Ok(value)
    }

    fn compute(&self) -> Result<Value, ReferenceError> {
        match &self.inner.kind {
            Kind::Helper { compute, .. } => Ok(compute()),
            Kind::Property { parent, key } => Ok(parent.try_value()?.get_prop(key)),
            Kind::Conditional { inner, to_bool } => Ok(Value::Bool(to_bool(&inner.try_value()?))),
            Kind::Const(value) => Ok(value.clone()),
            Kind::IterationItem { item, .. } => Ok(item.borrow().clone()),
        }
    }

    /// Whether [`PathRef::write_back`] has anywhere to write.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self.inner.kind, Kind::Property { .. })
    }

    /// Write `value` to the referenced property of the parent's value.
    ///
    /// Silently ignored when the parent value is not an object, or when this
    /// reference is not a property reference.
    pub fn write_back(&self, value: Value) {
        let Kind::Property { parent, key } = &self.inner.kind else {
            tracing::trace!(
                message = "reference.write_back.ignored",
                kind = self.inner.kind.name()
            );
            return;
        };
        let target = parent.value();
        if !target.set_prop(key, value) {
            tracing::trace!(message = "reference.write_back.non_object", key = &**key);
        }
    }

    /// Re-point an iteration item at `value`.
    ///
    /// Stores the value and dirties the item's tag only when `value` is not
    /// [`Value::same`] as the current one. Returns whether it changed. No-op
    /// for every other kind of reference.
    pub fn update(&self, value: Value) -> bool {
        let Kind::IterationItem { tag, item } = &self.inner.kind else {
            return false;
        };
        if item.borrow().same(&value) {
            return false;
        }
        *item.borrow_mut() = value;
        dirty_tag(tag);
        true
    }
}

impl fmt::Debug for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRef")
            .field("kind", &self.inner.kind.name())
            .field("label", &self.inner.label)
            .field("cached", &self.inner.cache.borrow().is_some())
            .finish()
    }
}
