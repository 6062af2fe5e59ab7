//! Property-based invariant tests for the keyed list reconciler.
//!
//! For any pair of sources (with holes and duplicate keys):
//!
//! 1. Replaying the notifications onto a mirror vector reproduces the live
//!    order of the manager.
//! 2. The live order equals the new source with holes and duplicates dropped.
//! 3. Keys present before and after a pass are never inserted or deleted.
//! 4. Reconciling the same source twice is all `retain`.
//! 5. `done()` fires exactly once per pass, last.
//! 6. A pass stopped after any number of steps leaves the next full pass
//!    reconciling exactly as if it had run from a clean state.

use std::collections::HashSet;

use proptest::prelude::*;
use weft_core::{Object, Value};
use weft_reference::{ChildPolicy, ItemKey, ListDelegate, ListManager, PathRef};

// ═════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════

/// Delegate that applies every notification to a plain vector.
#[derive(Default)]
struct Mirror {
    keys: Vec<String>,
    inserted: Vec<String>,
    deleted: Vec<String>,
    moved: usize,
    retained: usize,
    done: usize,
    after_done: bool,
}

impl Mirror {
    fn position(&self, key: Option<&ItemKey>) -> Result<usize, String> {
        match key {
            None => Ok(self.keys.len()),
            Some(key) => {
                let key = key.to_string();
                self.keys
                    .iter()
                    .position(|k| *k == key)
                    .ok_or_else(|| format!("unknown anchor {key}"))
            }
        }
    }

    fn reset_pass(&mut self) {
        self.inserted.clear();
        self.deleted.clear();
        self.moved = 0;
        self.retained = 0;
        self.done = 0;
        self.after_done = false;
    }

    fn touch(&mut self) {
        if self.done > 0 {
            self.after_done = true;
        }
    }
}

impl ListDelegate for Mirror {
    type Error = String;

    fn retain(&mut self, _key: &ItemKey, _item: &Value) -> Result<(), String> {
        self.touch();
        self.retained += 1;
        Ok(())
    }

    fn insert(
        &mut self,
        key: &ItemKey,
        _item: &PathRef,
        before: Option<&ItemKey>,
    ) -> Result<(), String> {
        self.touch();
        let at = self.position(before)?;
        self.keys.insert(at, key.to_string());
        self.inserted.push(key.to_string());
        Ok(())
    }

    fn move_item(
        &mut self,
        key: &ItemKey,
        _item: &PathRef,
        before: Option<&ItemKey>,
    ) -> Result<(), String> {
        self.touch();
        let from = self.position(Some(key))?;
        let moved = self.keys.remove(from);
        let at = self.position(before)?;
        self.keys.insert(at, moved);
        self.moved += 1;
        Ok(())
    }

    fn delete(&mut self, key: &ItemKey) -> Result<(), String> {
        self.touch();
        let at = self.position(Some(key))?;
        self.keys.remove(at);
        self.deleted.push(key.to_string());
        Ok(())
    }

    fn done(&mut self) -> Result<(), String> {
        self.done += 1;
        Ok(())
    }
}

fn source(ids: &[Option<u8>]) -> Value {
    Value::from(
        ids.iter()
            .map(|id| match id {
                Some(id) => Value::from(Object::new().with("id", u32::from(*id))),
                None => Value::Null,
            })
            .collect::<Vec<_>>(),
    )
}

fn expected(ids: &[Option<u8>]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .flatten()
        .filter(|id| seen.insert(**id))
        .map(ToString::to_string)
        .collect()
}

fn live(manager: &ListManager) -> Vec<String> {
    manager.keys().iter().map(ToString::to_string).collect()
}

fn keyed_source() -> impl Strategy<Value = Vec<Option<u8>>> {
    proptest::collection::vec(
        prop_oneof![
            8 => (0u8..12).prop_map(Some),
            1 => Just(None),
        ],
        0..24,
    )
}

fn setup(first: &[Option<u8>]) -> (Object, ListManager, Mirror) {
    let holder = Object::new().with("list", source(first));
    let root = PathRef::root(Value::from(holder.clone()), ChildPolicy::Memoized);
    let manager = ListManager::new(root.get("list"), "id");
    (holder, manager, Mirror::default())
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3. Mirror replay, final order, stable keys
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mirror_replay_matches_live_order(
        first in keyed_source(),
        second in keyed_source(),
    ) {
        let (holder, mut manager, mut mirror) = setup(&first);
        manager.sync(&mut mirror).unwrap();
        prop_assert_eq!(&mirror.keys, &expected(&first));
        prop_assert_eq!(live(&manager), expected(&first));

        mirror.reset_pass();
        holder.set("list", source(&second));
        manager.sync(&mut mirror).unwrap();

        prop_assert_eq!(&mirror.keys, &live(&manager));
        prop_assert_eq!(live(&manager), expected(&second));
    }

    #[test]
    fn shared_keys_are_never_inserted_or_deleted(
        first in keyed_source(),
        second in keyed_source(),
    ) {
        let (holder, mut manager, mut mirror) = setup(&first);
        manager.sync(&mut mirror).unwrap();
        mirror.reset_pass();
        holder.set("list", source(&second));
        manager.sync(&mut mirror).unwrap();

        let before: HashSet<String> = expected(&first).into_iter().collect();
        let after: HashSet<String> = expected(&second).into_iter().collect();
        for key in before.intersection(&after) {
            prop_assert!(!mirror.inserted.contains(key), "{} was re-inserted", key);
            prop_assert!(!mirror.deleted.contains(key), "{} was deleted", key);
        }
        prop_assert_eq!(mirror.inserted.len(), after.difference(&before).count());
        prop_assert_eq!(mirror.deleted.len(), before.difference(&after).count());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4-5. Idempotence and pass termination
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn same_source_twice_is_all_retain(ids in keyed_source()) {
        let (holder, mut manager, mut mirror) = setup(&ids);
        manager.sync(&mut mirror).unwrap();
        mirror.reset_pass();
        holder.set("list", source(&ids));
        let stats = manager.sync(&mut mirror).unwrap();

        prop_assert!(!stats.is_structural());
        prop_assert_eq!(mirror.retained, expected(&ids).len());
    }

    #[test]
    fn done_fires_once_and_last(
        first in keyed_source(),
        second in keyed_source(),
    ) {
        let (holder, mut manager, mut mirror) = setup(&first);
        manager.sync(&mut mirror).unwrap();
        prop_assert_eq!(mirror.done, 1);
        mirror.reset_pass();
        holder.set("list", source(&second));
        manager.sync(&mut mirror).unwrap();
        prop_assert_eq!(mirror.done, 1);
        prop_assert!(!mirror.after_done);
    }

    #[test]
    fn permutations_only_move(ids in proptest::collection::hash_set(0u8..40, 0..16)) {
        let first: Vec<Option<u8>> = ids.iter().copied().map(Some).collect();
        let mut second = first.clone();
        second.reverse();

        let (holder, mut manager, mut mirror) = setup(&first);
        manager.sync(&mut mirror).unwrap();
        mirror.reset_pass();
        holder.set("list", source(&second));
        let stats = manager.sync(&mut mirror).unwrap();

        prop_assert_eq!(stats.inserted + stats.deleted, 0);
        prop_assert_eq!(stats.moved, first.len().saturating_sub(1));
        prop_assert_eq!(live(&manager), expected(&second));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Passes stopped early
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stopped_pass_does_not_leak_into_the_next(
        first in keyed_source(),
        second in keyed_source(),
        third in keyed_source(),
        steps in 0usize..32,
    ) {
        let (holder, mut manager, mut mirror) = setup(&first);
        manager.sync(&mut mirror).unwrap();

        holder.set("list", source(&second));
        {
            let mut iterator = manager.iterator(&mut mirror);
            for _ in 0..steps {
                if iterator.next().unwrap() {
                    break;
                }
            }
        }
        prop_assert_eq!(&mirror.keys, &live(&manager));

        mirror.reset_pass();
        holder.set("list", source(&third));
        let stats = manager.sync(&mut mirror).unwrap();

        let duplicates = third.iter().flatten().count() - expected(&third).len();
        prop_assert_eq!(stats.skipped_duplicates, duplicates);
        prop_assert_eq!(&mirror.keys, &live(&manager));
        prop_assert_eq!(live(&manager), expected(&third));
    }
}
