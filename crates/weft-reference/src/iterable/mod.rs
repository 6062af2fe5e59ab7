#![forbid(unsafe_code)]

//! Keyed list reconciliation.
//!
//! A [`ListManager`] owns the live, ordered list of items rendered for one
//! array reference. Each pass walks the array's current items and reports
//! the structural edits to a [`ListDelegate`]:
//!
//! 1. **Append**: walk the source left to right with a cursor into the live
//!    list. A key at the cursor is retained. A key found ahead of the cursor
//!    is caught up to (nodes skipped on the way become *candidates*). A key
//!    that is a candidate is moved in front of the cursor. An unseen key is
//!    inserted in front of the cursor. `null`/`undefined` items are holes and
//!    are skipped.
//! 2. **Prune**: walk the live list from the head. Nodes handled this pass
//!    are un-marked and kept; the rest are removed and deleted.
//! 3. **Done**: `done()` fires once.
//!
//! Every pass starts by clearing the marks left on live nodes, so a pass that
//! never reached prune (a delegate error, or a [`ListIterator`] dropped
//! early) does not leak into the next one.
//!
//! # Invariants
//!
//! 1. After a completed pass the live order equals the source order with
//!    holes and duplicate keys dropped.
//! 2. Live order always matches the order implied by the notifications:
//!    `insert` and `move` place the item immediately before `before`, or at
//!    the end when `before` is `None`.
//! 3. A key present before and after a pass is never inserted or deleted.
//!
//! # Failure Modes
//!
//! - **Duplicate keys**: later occurrences are skipped with a `warn` event.
//! - **Delegate error**: the pass stops at the failing notification and the
//!   error is returned; the live list reflects every step taken before it.
//!   The next pass reconciles from that state.

mod arena;
mod key;

use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use weft_core::Value;

use crate::reference::PathRef;
use arena::{LinkedArena, NodeId};
pub use key::{ItemKey, KeyPath};
use key::KeyFor;

/// Hook reading a key path off an item.
pub type GetPath = Rc<dyn Fn(&Value, &str) -> Value>;

/// Hook turning an array value into its items, `None` when not iterable.
pub type ToIterator = Rc<dyn Fn(&Value) -> Option<Vec<Value>>>;

/// Receiver of reconciliation notifications.
///
/// `insert` and `move_item` name the key the item now sits in front of;
/// `None` means the end of the list.
pub trait ListDelegate {
    type Error;

    /// The item at `key` stays where it is.
    fn retain(&mut self, key: &ItemKey, item: &Value) -> Result<(), Self::Error> {
        let _ = (key, item);
        Ok(())
    }

    fn insert(
        &mut self,
        key: &ItemKey,
        item: &PathRef,
        before: Option<&ItemKey>,
    ) -> Result<(), Self::Error>;

    fn move_item(
        &mut self,
        key: &ItemKey,
        item: &PathRef,
        before: Option<&ItemKey>,
    ) -> Result<(), Self::Error>;

    fn delete(&mut self, key: &ItemKey) -> Result<(), Self::Error>;

    /// The pass is over.
    fn done(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Node of the live list.
struct ListItem {
    key: ItemKey,
    reference: PathRef,
    handled: bool,
}

impl ListItem {
    fn handle(&mut self, item: Value) {
        self.handled = true;
        self.reference.update(item);
    }
}

/// Notification counts of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncStats {
    pub retained: usize,
    pub inserted: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped_duplicates: usize,
}

impl SyncStats {
    /// Whether the pass changed the list structure.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.inserted + self.moved + self.deleted > 0
    }
}

// ---------------------------------------------------------------------------
// ListManager
// ---------------------------------------------------------------------------

/// Live keyed list for one array reference.
pub struct ListManager {
    array: PathRef,
    key_path: KeyPath,
    get_path: GetPath,
    to_iterator: ToIterator,
    map: AHashMap<ItemKey, NodeId>,
    list: LinkedArena<ListItem>,
}

impl ListManager {
    /// Empty list over `array`, keyed by `key_path`.
    ///
    /// Keys are read with [`Value::get_prop`] and items with
    /// [`Value::iter_items`] until replaced with [`ListManager::with_get_path`]
    /// or [`ListManager::with_to_iterator`].
    pub fn new(array: PathRef, key_path: impl Into<KeyPath>) -> Self {
        Self {
            array,
            key_path: key_path.into(),
            get_path: Rc::new(|item: &Value, path: &str| item.get_prop(path)),
            to_iterator: Rc::new(Value::iter_items),
            map: AHashMap::new(),
            list: LinkedArena::default(),
        }
    }

    #[must_use]
    pub fn with_get_path(mut self, get_path: GetPath) -> Self {
        self.get_path = get_path;
        self
    }

    #[must_use]
    pub fn with_to_iterator(mut self, to_iterator: ToIterator) -> Self {
        self.to_iterator = to_iterator;
        self
    }

    #[must_use]
    pub fn array(&self) -> &PathRef {
        &self.array
    }

    #[must_use]
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.len() == 0
    }

    /// Live keys in list order.
    #[must_use]
    pub fn keys(&self) -> Vec<ItemKey> {
        self.list.iter().map(|item| item.key.clone()).collect()
    }

    /// Per-item reference of a live key.
    #[must_use]
    pub fn reference_for(&self, key: &ItemKey) -> Option<PathRef> {
        let id = self.map.get(key)?;
        self.list.get(*id).map(|item| item.reference.clone())
    }

    /// Start a pass over the array's current items.
    pub fn iterator<'a, D: ListDelegate + ?Sized>(
        &'a mut self,
        target: &'a mut D,
    ) -> ListIterator<'a, D> {
        let value = self.array.value();
        let items = (self.to_iterator)(&value).unwrap_or_else(|| {
            tracing::trace!(message = "list.not_iterable", value = ?value);
            Vec::new()
        });
        for node in self.list.values_mut() {
            node.handled = false;
        }
        let list_position = self.list.head();
        ListIterator {
            manager: self,
            target,
            items,
            array_position: 0,
            list_position,
            candidates: AHashSet::new(),
            phase: Phase::Append,
            stats: SyncStats::default(),
        }
    }

    /// Run a whole pass.
    pub fn sync<D: ListDelegate + ?Sized>(&mut self, target: &mut D) -> Result<SyncStats, D::Error> {
        let span = tracing::debug_span!("list.sync", key_path = %self.key_path);
        let _entered = span.enter();
        let mut iterator = self.iterator(target);
        while !iterator.next()? {}
        Ok(iterator.stats())
    }

    fn key_for(&self, item: &Value, index: usize) -> ItemKey {
        KeyFor {
            path: &self.key_path,
            get_path: &*self.get_path,
        }
        .key(item, index)
    }

    fn key_at(&self, id: Option<NodeId>) -> Option<ItemKey> {
        id.and_then(|id| self.list.get(id)).map(|item| item.key.clone())
    }
}

impl fmt::Debug for ListManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListManager")
            .field("key_path", &self.key_path)
            .field("keys", &self.keys())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ListIterator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Append,
    Prune,
    Done,
    Finished,
}

/// One reconciliation pass, driven step by step.
pub struct ListIterator<'a, D: ListDelegate + ?Sized> {
    manager: &'a mut ListManager,
    target: &'a mut D,
    items: Vec<Value>,
    array_position: usize,
    list_position: Option<NodeId>,
    candidates: AHashSet<NodeId>,
    phase: Phase,
    stats: SyncStats,
}

impl<D: ListDelegate + ?Sized> ListIterator<'_, D> {
    /// Advance to the next notification.
    ///
    /// Returns `Ok(true)` once `done()` has fired; further calls do nothing.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool, D::Error> {
        loop {
            let emitted = match self.phase {
                Phase::Append => self.next_append()?,
                Phase::Prune => self.next_prune()?,
                Phase::Done => {
                    self.next_done()?;
                    return Ok(true);
                }
                Phase::Finished => return Ok(true),
            };
            if emitted {
                return Ok(false);
            }
        }
    }

    /// Counts so far.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    fn next_append(&mut self) -> Result<bool, D::Error> {
        let index = self.array_position;
        let Some(item) = self.items.get(index).cloned() else {
            self.phase = Phase::Prune;
            self.list_position = self.manager.list.head();
            return Ok(false);
        };
        self.array_position += 1;

        if item.is_nullish() {
            return Ok(false);
        }

        let key = self.manager.key_for(&item, index);

        if let Some(pos) = self.list_position
            && self.manager.key_at(Some(pos)).as_ref() == Some(&key)
        {
            if let Some(node) = self.manager.list.get_mut(pos) {
                node.handle(item.clone());
            }
            self.list_position = self.manager.list.next(pos);
            return self.retain(&key, &item).map(|()| true);
        }

        let Some(&found) = self.manager.map.get(&key) else {
            return self.insert(key, item).map(|()| true);
        };

        let handled = self.manager.list.get(found).is_some_and(|node| node.handled);
        if handled {
            tracing::warn!(message = "list.duplicate_key", key = %key, index);
            self.stats.skipped_duplicates += 1;
            return Ok(false);
        }
        if let Some(node) = self.manager.list.get_mut(found) {
            node.handle(item.clone());
        }

        if self.candidates.remove(&found) {
            self.manager.list.move_before(found, self.list_position);
            let before = self.manager.key_at(self.list_position);
            let reference = self.reference_at(found);
            tracing::trace!(message = "list.move", key = %key, before = ?before);
            self.stats.moved += 1;
            self.target
                .move_item(&key, &reference, before.as_ref())
                .map(|()| true)
        } else {
            self.advance_to(found);
            self.retain(&key, &item).map(|()| true)
        }
    }

    fn retain(&mut self, key: &ItemKey, item: &Value) -> Result<(), D::Error> {
        tracing::trace!(message = "list.retain", key = %key);
        self.stats.retained += 1;
        self.target.retain(key, item)
    }

    fn insert(&mut self, key: ItemKey, item: Value) -> Result<(), D::Error> {
        let reference = PathRef::iteration_item(&self.manager.array, item, &key);
        let id = self.manager.list.insert_before(
            ListItem {
                key: key.clone(),
                reference: reference.clone(),
                handled: true,
            },
            self.list_position,
        );
        self.manager.map.insert(key.clone(), id);
        let before = self.manager.key_at(self.list_position);
        tracing::trace!(message = "list.insert", key = %key, before = ?before);
        self.stats.inserted += 1;
        self.target.insert(&key, &reference, before.as_ref())
    }

    /// Catch the cursor up to `found`, which sits ahead of it. Nodes passed
    /// on the way become candidates.
    fn advance_to(&mut self, found: NodeId) {
        let mut skipped: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut seek = self.list_position;
        while let Some(id) = seek {
            if id == found {
                self.candidates.extend(skipped);
                self.list_position = self.manager.list.next(id);
                return;
            }
            skipped.push(id);
            seek = self.manager.list.next(id);
        }
        tracing::warn!(message = "list.cursor_lost");
    }

    fn reference_at(&self, id: NodeId) -> PathRef {
        self.manager
            .list
            .get(id)
            .map_or_else(PathRef::undefined, |node| node.reference.clone())
    }

    fn next_prune(&mut self) -> Result<bool, D::Error> {
        let Some(id) = self.list_position else {
            self.phase = Phase::Done;
            return Ok(false);
        };
        self.list_position = self.manager.list.next(id);

        if let Some(node) = self.manager.list.get_mut(id)
            && node.handled
        {
            node.handled = false;
            return Ok(false);
        }

        let Some(node) = self.manager.list.remove(id) else {
            return Ok(false);
        };
        self.manager.map.remove(&node.key);
        tracing::trace!(message = "list.delete", key = %node.key);
        self.stats.deleted += 1;
        self.target.delete(&node.key).map(|()| true)
    }

    fn next_done(&mut self) -> Result<(), D::Error> {
        self.phase = Phase::Finished;
        let SyncStats {
            retained,
            inserted,
            moved,
            deleted,
            skipped_duplicates,
        } = self.stats;
        tracing::debug!(
            message = "list.done",
            retained,
            inserted,
            moved,
            deleted,
            skipped_duplicates,
            len = self.manager.len()
        );
        self.target.done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use weft_core::Object;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Retain(String),
        Insert(String, Option<String>),
        Move(String, Option<String>),
        Delete(String),
        Done,
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
    }

    impl Recorder {
        fn count(&self, f: impl Fn(&Op) -> bool) -> usize {
            self.ops.iter().filter(|op| f(op)).count()
        }
    }

    impl ListDelegate for Recorder {
        type Error = String;

        fn retain(&mut self, key: &ItemKey, _item: &Value) -> Result<(), String> {
            self.ops.push(Op::Retain(key.to_string()));
            Ok(())
        }

        fn insert(
            &mut self,
            key: &ItemKey,
            _item: &PathRef,
            before: Option<&ItemKey>,
        ) -> Result<(), String> {
            self.ops
                .push(Op::Insert(key.to_string(), before.map(ToString::to_string)));
            Ok(())
        }

        fn move_item(
            &mut self,
            key: &ItemKey,
            _item: &PathRef,
            before: Option<&ItemKey>,
        ) -> Result<(), String> {
            self.ops
                .push(Op::Move(key.to_string(), before.map(ToString::to_string)));
            Ok(())
        }

        fn delete(&mut self, key: &ItemKey) -> Result<(), String> {
            self.ops.push(Op::Delete(key.to_string()));
            Ok(())
        }

        fn done(&mut self) -> Result<(), String> {
            self.ops.push(Op::Done);
            Ok(())
        }
    }

    fn items(ids: &[i32]) -> Value {
        Value::from(
            ids.iter()
                .map(|&id| Value::from(Object::new().with("id", id)))
                .collect::<Vec<_>>(),
        )
    }

    fn keyed_list(ids: &[i32]) -> (Object, ListManager) {
        let holder = Object::new().with("list", items(ids));
        let root = PathRef::root(Value::from(holder.clone()), crate::ChildPolicy::Memoized);
        let mut manager = ListManager::new(root.get("list"), "id");
        manager.sync(&mut Recorder::default()).unwrap();
        (holder, manager)
    }

    fn keys(manager: &ListManager) -> Vec<String> {
        manager.keys().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn initial_pass_inserts_everything_in_order() {
        let (_, manager) = keyed_list(&[1, 2, 3]);
        assert_eq!(keys(&manager), ["1", "2", "3"]);
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn identical_source_retains_everything() {
        let (holder, mut manager) = keyed_list(&[1, 2, 3]);
        holder.set("list", items(&[1, 2, 3]));
        let mut rec = Recorder::default();
        let stats = manager.sync(&mut rec).unwrap();
        assert_eq!(
            rec.ops,
            [
                Op::Retain("1".into()),
                Op::Retain("2".into()),
                Op::Retain("3".into()),
                Op::Done
            ]
        );
        assert!(!stats.is_structural());
    }

    #[test]
    fn insert_and_delete() {
        let (holder, mut manager) = keyed_list(&[1, 2, 3]);
        holder.set("list", items(&[1, 3, 4]));
        let mut rec = Recorder::default();
        manager.sync(&mut rec).unwrap();

        assert!(rec.ops.contains(&Op::Delete("2".into())));
        assert!(rec.ops.contains(&Op::Insert("4".into(), None)));
        assert_eq!(rec.count(|op| matches!(op, Op::Move(..))), 0);
        assert_eq!(rec.ops.last(), Some(&Op::Done));
        assert_eq!(keys(&manager), ["1", "3", "4"]);
    }

    #[test]
    fn reverse_emits_two_moves() {
        let (holder, mut manager) = keyed_list(&[1, 2, 3]);
        holder.set("list", items(&[3, 2, 1]));
        let mut rec = Recorder::default();
        let stats = manager.sync(&mut rec).unwrap();

        assert_eq!(stats.moved, 2);
        assert_eq!(stats.inserted + stats.deleted, 0);
        assert_eq!(keys(&manager), ["3", "2", "1"]);
        assert_eq!(
            rec.ops,
            [
                Op::Retain("3".into()),
                Op::Move("2".into(), None),
                Op::Move("1".into(), None),
                Op::Done
            ]
        );
    }

    #[test]
    fn insert_in_the_middle_names_the_next_key() {
        let (holder, mut manager) = keyed_list(&[1, 3]);
        holder.set("list", items(&[1, 2, 3]));
        let mut rec = Recorder::default();
        manager.sync(&mut rec).unwrap();
        assert!(rec.ops.contains(&Op::Insert("2".into(), Some("3".into()))));
        assert_eq!(keys(&manager), ["1", "2", "3"]);
    }

    #[test]
    fn holes_are_skipped_but_count_for_index_keys() {
        let holder = Object::new().with(
            "list",
            Value::from(vec![Value::from("a"), Value::Null, Value::from("c")]),
        );
        let root = PathRef::root(Value::from(holder), crate::ChildPolicy::Memoized);
        let mut manager = ListManager::new(root.get("list"), "@index");
        manager.sync(&mut Recorder::default()).unwrap();
        assert_eq!(keys(&manager), ["0", "2"]);
    }

    #[test]
    fn index_keys_update_item_references_in_place() {
        let holder = Object::new().with("list", Value::from(vec!["a", "b"]));
        let root = PathRef::root(Value::from(holder.clone()), crate::ChildPolicy::Memoized);
        let mut manager = ListManager::new(root.get("list"), "@index");
        manager.sync(&mut Recorder::default()).unwrap();
        let first = manager.reference_for(&ItemKey::from("0")).unwrap();
        assert_eq!(first.value().as_str(), Some("a"));

        holder.set("list", Value::from(vec!["z", "b"]));
        let mut rec = Recorder::default();
        manager.sync(&mut rec).unwrap();
        assert_eq!(rec.count(|op| matches!(op, Op::Retain(_))), 2);
        assert_eq!(first.value().as_str(), Some("z"));
    }

    #[test]
    fn nullish_and_non_iterable_sources_reconcile_to_empty() {
        let (holder, mut manager) = keyed_list(&[1, 2]);
        holder.set("list", Value::Null);
        let mut rec = Recorder::default();
        manager.sync(&mut rec).unwrap();
        assert_eq!(rec.count(|op| matches!(op, Op::Delete(_))), 2);
        assert!(manager.is_empty());

        holder.set("list", Value::from(42));
        manager.sync(&mut Recorder::default()).unwrap();
        assert!(manager.is_empty());
    }

    #[test]
    fn duplicate_keys_do_not_crash() {
        let (holder, mut manager) = keyed_list(&[1, 1, 2]);
        assert_eq!(keys(&manager), ["1", "2"]);
        holder.set("list", items(&[2, 2, 1, 1]));
        let stats = manager.sync(&mut Recorder::default()).unwrap();
        assert_eq!(stats.skipped_duplicates, 2);
        assert_eq!(keys(&manager), ["2", "1"]);
    }

    #[test]
    fn step_wise_iteration_reports_done_once() {
        let (holder, mut manager) = keyed_list(&[1]);
        holder.set("list", items(&[2]));
        let mut rec = Recorder::default();
        let mut iterator = manager.iterator(&mut rec);
        assert!(!iterator.next().unwrap()); // insert 2
        assert!(!iterator.next().unwrap()); // delete 1
        assert!(iterator.next().unwrap()); // done
        assert!(iterator.next().unwrap());
        assert_eq!(iterator.stats().inserted, 1);
        assert_eq!(rec.count(|op| *op == Op::Done), 1);
    }

    struct FailOnDelete;

    impl ListDelegate for FailOnDelete {
        type Error = String;

        fn insert(&mut self, _: &ItemKey, _: &PathRef, _: Option<&ItemKey>) -> Result<(), String> {
            Ok(())
        }

        fn move_item(&mut self, _: &ItemKey, _: &PathRef, _: Option<&ItemKey>) -> Result<(), String> {
            Ok(())
        }

        fn delete(&mut self, key: &ItemKey) -> Result<(), String> {
            Err(format!("cannot delete {key}"))
        }
    }

    #[test]
    fn delegate_errors_abort_the_pass() {
        let (holder, mut manager) = keyed_list(&[1, 2]);
        holder.set("list", items(&[2]));
        let err = manager.sync(&mut FailOnDelete).unwrap_err();
        assert_eq!(err, "cannot delete 1");
    }

    #[test]
    fn pass_after_a_failed_delete_reconciles_fully() {
        let (holder, mut manager) = keyed_list(&[1, 2, 3]);
        holder.set("list", items(&[3, 2]));
        assert!(manager.sync(&mut FailOnDelete).is_err());
        assert_eq!(keys(&manager), ["3", "2"]);

        holder.set("list", items(&[2, 3]));
        let mut rec = Recorder::default();
        let stats = manager.sync(&mut rec).unwrap();
        assert_eq!(stats.skipped_duplicates, 0);
        assert_eq!(
            rec.ops,
            [
                Op::Retain("2".into()),
                Op::Move("3".into(), None),
                Op::Done
            ]
        );
        assert_eq!(keys(&manager), ["2", "3"]);
    }

    #[test]
    fn pass_after_a_dropped_iterator_reconciles_fully() {
        let (holder, mut manager) = keyed_list(&[1, 2, 3]);
        holder.set("list", items(&[3, 1, 2]));
        {
            let mut rec = Recorder::default();
            let mut iterator = manager.iterator(&mut rec);
            assert!(!iterator.next().unwrap()); // retain 3
        }

        holder.set("list", items(&[1, 3, 2]));
        let mut rec = Recorder::default();
        let stats = manager.sync(&mut rec).unwrap();
        assert_eq!(stats.skipped_duplicates, 0);
        assert_eq!(
            rec.ops,
            [
                Op::Retain("1".into()),
                Op::Retain("3".into()),
                Op::Move("2".into(), None),
                Op::Done
            ]
        );
        assert_eq!(keys(&manager), ["1", "3", "2"]);
    }

    #[test]
    fn custom_hooks_are_used() {
        let array = PathRef::constant(Value::from("xy"));
        let calls = Rc::new(RefCell::new(0));
        let calls_clone = Rc::clone(&calls);
        let mut manager = ListManager::new(array, "len")
            .with_get_path(Rc::new(move |item: &Value, _path: &str| {
                *calls_clone.borrow_mut() += 1;
                item.clone()
            }))
            .with_to_iterator(Rc::new(|value: &Value| {
                value.iter_items().map(|mut items| {
                    items.reverse();
                    items
                })
            }));
        manager.sync(&mut Recorder::default()).unwrap();
        assert_eq!(keys(&manager), ["y", "x"]);
        assert_eq!(*calls.borrow(), 2);
    }
}
