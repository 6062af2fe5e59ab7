#![forbid(unsafe_code)]

//! Index-based doubly-linked list.
//!
//! Nodes live in a slot vector and link to each other by [`NodeId`]. Removed
//! slots go on a free list and are reused by later inserts, so ids of live
//! nodes never move.
//!
//! # Invariants
//!
//! 1. `head`/`tail` are `None` iff the list is empty.
//! 2. Every live node is reachable from `head` exactly once.
//! 3. A [`NodeId`] stays valid until its node is removed.

/// Stable handle to a node of a [`LinkedArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

struct Slot<T> {
    value: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

pub(crate) struct LinkedArena<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> Default for LinkedArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }
}

impl<T> LinkedArena<T> {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn head(&self) -> Option<NodeId> {
        self.head
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        self.slot(id).map(|slot| &slot.value)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.value)
    }

    /// Every live value, in slot order rather than list order.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().flatten().map(|slot| &mut slot.value)
    }

    pub(crate) fn next(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|slot| slot.next)
    }

    fn slot(&self, id: NodeId) -> Option<&Slot<T>> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot<T>> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Allocate `value` and link it in front of `before` (at the tail when
    /// `before` is `None`).
    pub(crate) fn insert_before(&mut self, value: T, before: Option<NodeId>) -> NodeId {
        let slot = Slot {
            value,
            prev: None,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.0 as usize] = Some(slot);
                id
            }
            None => {
                let raw = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Some(slot));
                NodeId(raw)
            }
        };
        self.len += 1;
        self.link_before(id, before);
        id
    }

    /// Move a linked node in front of `before`.
    pub(crate) fn move_before(&mut self, id: NodeId, before: Option<NodeId>) {
        if before == Some(id) {
            return;
        }
        self.unlink(id);
        self.link_before(id, before);
    }

    /// Unlink and free a node, returning its value.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        self.slot(id)?;
        self.unlink(id);
        let slot = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.push(id);
        self.len -= 1;
        Some(slot.value)
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let (prev, next) = (slot.prev.take(), slot.next.take());
        match prev {
            Some(p) => {
                if let Some(slot) = self.slot_mut(p) {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slot_mut(n) {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn link_before(&mut self, id: NodeId, before: Option<NodeId>) {
        let prev = match before {
            Some(b) => self.slot(b).and_then(|slot| slot.prev),
            None => self.tail,
        };
        if let Some(slot) = self.slot_mut(id) {
            slot.prev = prev;
            slot.next = before;
        }
        match prev {
            Some(p) => {
                if let Some(slot) = self.slot_mut(p) {
                    slot.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        match before {
            Some(b) => {
                if let Some(slot) = self.slot_mut(b) {
                    slot.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
    }

    /// Ids in list order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.head, |&id| self.next(id))
    }

    /// Values in list order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.ids().filter_map(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(arena: &LinkedArena<char>) -> String {
        arena.iter().collect()
    }

    #[test]
    fn insert_at_tail_and_before() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        let c = arena.insert_before('c', None);
        arena.insert_before('b', Some(c));
        arena.insert_before('_', Some(a));
        assert_eq!(values(&arena), "_abc");
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn move_before_relinks() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        let b = arena.insert_before('b', None);
        let c = arena.insert_before('c', None);

        arena.move_before(c, Some(a));
        assert_eq!(values(&arena), "cab");
        arena.move_before(c, None);
        assert_eq!(values(&arena), "abc");
        arena.move_before(b, Some(b));
        assert_eq!(values(&arena), "abc");
        assert_eq!(arena.head(), Some(a));
    }

    #[test]
    fn remove_frees_and_reuses_slots() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        let b = arena.insert_before('b', None);
        arena.insert_before('c', None);

        assert_eq!(arena.remove(b), Some('b'));
        assert_eq!(arena.remove(b), None);
        assert_eq!(values(&arena), "ac");

        let d = arena.insert_before('d', None);
        assert_eq!(d, b);
        assert_eq!(values(&arena), "acd");

        arena.remove(a);
        assert_eq!(values(&arena), "cd");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn emptying_resets_ends() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        arena.remove(a);
        assert_eq!(arena.head(), None);
        assert_eq!(arena.len(), 0);
        arena.insert_before('z', None);
        assert_eq!(values(&arena), "z");
    }

    #[test]
    fn values_mut_skips_freed_slots() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        arena.insert_before('b', None);
        arena.insert_before('c', None);
        arena.remove(a);
        for value in arena.values_mut() {
            *value = value.to_ascii_uppercase();
        }
        assert_eq!(values(&arena), "BC");
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut arena = LinkedArena::default();
        let a = arena.insert_before('a', None);
        if let Some(v) = arena.get_mut(a) {
            *v = 'x';
        }
        assert_eq!(arena.get(a), Some(&'x'));
        assert_eq!(arena.next(a), None);
    }
}
