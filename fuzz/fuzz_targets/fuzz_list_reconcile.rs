#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use weft_core::{Object, Value};
use weft_reference::{ChildPolicy, ItemKey, ListDelegate, ListManager, PathRef};

#[derive(Arbitrary, Debug)]
enum FuzzItem {
    Keyed(u8),
    Hole,
    Bare(u8),
}

#[derive(Arbitrary, Debug)]
enum FuzzKey {
    Id,
    Index,
    Identity,
}

impl FuzzKey {
    fn path(&self) -> &'static str {
        match self {
            FuzzKey::Id => "id",
            FuzzKey::Index => "@index",
            FuzzKey::Identity => "@identity",
        }
    }
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    key: FuzzKey,
    passes: Vec<Vec<FuzzItem>>,
}

/// Replays notifications and panics when they disagree with themselves.
#[derive(Default)]
struct Mirror(Vec<ItemKey>);

impl Mirror {
    fn position(&self, key: Option<&ItemKey>) -> usize {
        match key {
            None => self.0.len(),
            Some(key) => self
                .0
                .iter()
                .position(|k| k == key)
                .expect("anchor must be rendered"),
        }
    }
}

impl ListDelegate for Mirror {
    type Error = ();

    fn insert(&mut self, key: &ItemKey, _: &PathRef, before: Option<&ItemKey>) -> Result<(), ()> {
        let at = self.position(before);
        self.0.insert(at, key.clone());
        Ok(())
    }

    fn move_item(&mut self, key: &ItemKey, _: &PathRef, before: Option<&ItemKey>) -> Result<(), ()> {
        let from = self.position(Some(key));
        let moved = self.0.remove(from);
        let at = self.position(before);
        self.0.insert(at, moved);
        Ok(())
    }

    fn delete(&mut self, key: &ItemKey) -> Result<(), ()> {
        let at = self.position(Some(key));
        self.0.remove(at);
        Ok(())
    }
}

fuzz_target!(|input: FuzzInput| {
    // A small pool so identity keys repeat across passes.
    let pool: Vec<Value> = (0..16u32)
        .map(|id| Value::from(Object::new().with("id", id % 8)))
        .collect();

    let holder = Object::new();
    let root = PathRef::root(Value::from(holder.clone()), ChildPolicy::Memoized);
    let mut manager = ListManager::new(root.get("list"), input.key.path());
    let mut mirror = Mirror::default();

    for pass in input.passes.iter().take(32) {
        let items: Vec<Value> = pass
            .iter()
            .take(64)
            .map(|item| match item {
                FuzzItem::Keyed(n) => pool[usize::from(*n) % pool.len()].clone(),
                FuzzItem::Hole => Value::Null,
                FuzzItem::Bare(n) => Value::from(u32::from(*n % 4)),
            })
            .collect();
        holder.set("list", Value::from(items));
        let _ = manager.sync(&mut mirror);
        assert_eq!(mirror.0, manager.keys());
    }
});
