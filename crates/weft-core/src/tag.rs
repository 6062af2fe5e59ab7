#![forbid(unsafe_code)]

//! Revision tags.
//!
//! A [`Tag`] stands for one mutable cell. It carries the revision at which the
//! cell last changed. Revisions come from a single thread-local clock shared
//! by all tags, so "has anything I read changed since revision N" is a plain
//! integer comparison.
//!
//! # Invariants
//!
//! 1. The clock only moves forward; every [`dirty_tag`] takes a fresh maximum.
//! 2. A fresh tag reports [`INITIAL`].
//! 3. Dirtying a tag that an active computation already consumed is rejected.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::TrackingError;
use crate::tracking;

/// Position on the revision clock.
pub type Revision = u64;

/// Revision of values that can never change.
pub const CONSTANT: Revision = 0;

/// Revision of a fresh tag, and of the clock before the first dirty.
pub const INITIAL: Revision = 1;

thread_local! {
    static CLOCK: Cell<Revision> = const { Cell::new(INITIAL) };
    static NEXT_TAG_ID: Cell<u64> = const { Cell::new(1) };
}

/// Current value of the revision clock.
#[must_use]
pub fn current_revision() -> Revision {
    CLOCK.with(Cell::get)
}

fn advance_clock() -> Revision {
    CLOCK.with(|clock| {
        let next = clock.get() + 1;
        clock.set(next);
        next
    })
}

/// Stable identifier of a tag, used for diagnostics and frame bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u64);

impl TagId {
    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct TagInner {
    id: TagId,
    revision: Cell<Revision>,
}

/// Change history of one mutable cell.
///
/// Cloning a `Tag` yields another handle to the **same** cell.
#[derive(Clone)]
pub struct Tag {
    inner: Rc<TagInner>,
}

impl Tag {
    /// Revision at which this tag was last dirtied.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.inner.revision.get()
    }

    /// Whether nothing changed after `snapshot`.
    #[must_use]
    pub fn validate(&self, snapshot: Revision) -> bool {
        self.revision() <= snapshot
    }

    #[must_use]
    pub fn id(&self) -> TagId {
        self.inner.id
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Tag) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("id", &self.inner.id)
            .field("revision", &self.revision())
            .finish()
    }
}

/// Create a tag at [`INITIAL`].
#[must_use]
pub fn create_tag() -> Tag {
    let id = NEXT_TAG_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        TagId(id)
    });
    Tag {
        inner: Rc::new(TagInner {
            id,
            revision: Cell::new(INITIAL),
        }),
    }
}

/// Advance the clock and stamp `tag` with the new revision.
///
/// Fails when a computation that is still running has already consumed
/// `tag`.
pub fn try_dirty_tag(tag: &Tag) -> Result<(), TrackingError> {
    if tracking::is_consumed(tag) {
        return Err(TrackingError::TagConsumedDuringComputation { tag: tag.id() });
    }
    let revision = advance_clock();
    tag.inner.revision.set(revision);
    tracing::trace!(message = "tag.dirty", tag = tag.id().raw(), revision);
    Ok(())
}

/// Advance the clock and stamp `tag` with the new revision.
///
/// # Panics
///
/// Panics when a computation that is still running has already consumed
/// `tag` (see [`try_dirty_tag`]).
pub fn dirty_tag(tag: &Tag) {
    if let Err(err) = try_dirty_tag(tag) {
        panic!("{err}");
    }
}

/// Record a read of `tag` in the innermost tracking frame, if any.
pub fn consume_tag(tag: &Tag) {
    tracking::consume(tag);
}
