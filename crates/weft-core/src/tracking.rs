#![forbid(unsafe_code)]

//! Tracking frames.
//!
//! A tracking frame collects every tag consumed while a computation runs.
//! Frames form a thread-local stack: [`track`] pushes one, runs the closure,
//! and pops it again, handing back the [`Dependencies`] it saw. Nested
//! computations get their own frame; it is up to the nested computation to
//! re-consume its dependencies into the outer frame once it is done.
//!
//! Frames are popped by a drop guard, so a panic inside a computation never
//! leaves a stale frame on the stack.

use std::cell::RefCell;

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::tag::{CONSTANT, Revision, Tag, TagId, consume_tag};

enum Frame {
    Tracking(Tracker),
    Untracked,
}

#[derive(Default)]
struct Tracker {
    tags: SmallVec<[Tag; 4]>,
    seen: AHashSet<TagId>,
}

impl Tracker {
    fn add(&mut self, tag: &Tag) {
        if self.seen.insert(tag.id()) {
            self.tags.push(tag.clone());
        }
    }
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

struct FrameGuard {
    depth: usize,
    popped: bool,
}

impl FrameGuard {
    fn push(frame: Frame) -> Self {
        let depth = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            frames.push(frame);
            frames.len()
        });
        Self {
            depth,
            popped: false,
        }
    }

    fn finish(mut self) -> Dependencies {
        self.popped = true;
        let frame = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            debug_assert_eq!(frames.len(), self.depth, "tracking frames out of order");
            frames.pop()
        });
        match frame {
            Some(Frame::Tracking(tracker)) => Dependencies { tags: tracker.tags },
            _ => Dependencies::default(),
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.popped {
            FRAMES.with(|frames| {
                let mut frames = frames.borrow_mut();
                frames.truncate(self.depth.saturating_sub(1));
            });
        }
    }
}

/// Tags consumed by one computation.
#[derive(Clone, Default)]
pub struct Dependencies {
    tags: SmallVec<[Tag; 4]>,
}

impl Dependencies {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    #[must_use]
    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t.ptr_eq(tag))
    }

    /// Highest revision among the tags, or [`CONSTANT`] when empty.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.tags
            .iter()
            .map(Tag::revision)
            .max()
            .unwrap_or(CONSTANT)
    }

    /// Whether no tag changed after `snapshot`.
    #[must_use]
    pub fn validate(&self, snapshot: Revision) -> bool {
        self.tags.iter().all(|tag| tag.validate(snapshot))
    }

    /// Consume every tag into the innermost tracking frame.
    pub fn consume(&self) {
        for tag in &self.tags {
            consume_tag(tag);
        }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tags.iter().map(Tag::id))
            .finish()
    }
}

/// Run `f` in a fresh tracking frame and return what it consumed.
pub fn track<T>(f: impl FnOnce() -> T) -> (T, Dependencies) {
    let guard = FrameGuard::push(Frame::Tracking(Tracker::default()));
    let value = f();
    let deps = guard.finish();
    (value, deps)
}

/// Run `f` with consumption disabled.
///
/// Reads inside `f` do not leak into any enclosing frame.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let guard = FrameGuard::push(Frame::Untracked);
    let value = f();
    drop(guard.finish());
    value
}

/// Whether consumption is currently being recorded.
#[must_use]
pub fn is_tracking() -> bool {
    FRAMES.with(|frames| matches!(frames.borrow().last(), Some(Frame::Tracking(_))))
}

pub(crate) fn consume(tag: &Tag) {
    FRAMES.with(|frames| {
        if let Some(Frame::Tracking(tracker)) = frames.borrow_mut().last_mut() {
            tracker.add(tag);
        }
    });
}

/// Whether any active frame has consumed `tag`.
pub(crate) fn is_consumed(tag: &Tag) -> bool {
    let id = tag.id();
    FRAMES.with(|frames| {
        frames.borrow().iter().any(|frame| match frame {
            Frame::Tracking(tracker) => tracker.seen.contains(&id),
            Frame::Untracked => false,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{create_tag, dirty_tag};

    #[test]
    fn track_collects_each_tag_once() {
        let a = create_tag();
        let b = create_tag();
        let ((), deps) = track(|| {
            consume_tag(&a);
            consume_tag(&b);
            consume_tag(&a);
        });
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&a));
        assert!(deps.contains(&b));
    }

    #[test]
    fn nested_frames_are_isolated() {
        let outer_tag = create_tag();
        let inner_tag = create_tag();
        let (inner_deps, outer_deps) = track(|| {
            consume_tag(&outer_tag);
            let ((), inner) = track(|| consume_tag(&inner_tag));
            inner
        });
        assert_eq!(inner_deps.len(), 1);
        assert!(inner_deps.contains(&inner_tag));
        assert_eq!(outer_deps.len(), 1);
        assert!(outer_deps.contains(&outer_tag));
    }

    #[test]
    fn consume_forwards_into_outer_frame() {
        let tag = create_tag();
        let ((), inner) = track(|| consume_tag(&tag));
        let ((), outer) = track(|| inner.consume());
        assert!(outer.contains(&tag));
    }

    #[test]
    fn untrack_hides_reads() {
        let tag = create_tag();
        let ((), deps) = track(|| {
            untrack(|| consume_tag(&tag));
            assert!(is_tracking());
        });
        assert!(deps.is_empty());
    }

    #[test]
    fn consume_outside_a_frame_is_a_no_op() {
        assert!(!is_tracking());
        consume_tag(&create_tag());
    }

    #[test]
    fn revision_and_validate_follow_the_max_tag() {
        let a = create_tag();
        let b = create_tag();
        let ((), deps) = track(|| {
            consume_tag(&a);
            consume_tag(&b);
        });
        let snapshot = crate::tag::current_revision();
        assert!(deps.validate(snapshot));

        dirty_tag(&b);
        assert_eq!(deps.revision(), b.revision());
        assert!(!deps.validate(snapshot));
        assert_eq!(Dependencies::default().revision(), CONSTANT);
    }

    #[test]
    fn panic_inside_track_unwinds_the_frame() {
        let result = std::panic::catch_unwind(|| {
            let _ = track(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(!is_tracking());
    }
}
