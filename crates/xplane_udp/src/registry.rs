//! # Subscription Registry
//!
//! Dual-keyed mapping between wire ids and dataref names.
//!
//! ## Design
//!
//! - Two ordered maps behind one `RwLock`, always updated together
//! - Ids come from an ever-increasing counter and are never reused
//! - Array elements are registered as `name[index]` right after their base name
//! - The registry never shrinks below one entry: a live subscription is what
//!   keeps the simulator streaming

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;

/// Composes the wire name of a dataref, `name[index]` for an array element.
#[must_use]
pub fn wire_name(name: &str, index: Option<usize>) -> Cow<'_, str> {
    match index {
        Some(i) => Cow::Owned(format!("{name}[{i}]")),
        None => Cow::Borrowed(name),
    }
}

#[derive(Default)]
struct Maps {
    by_id: BTreeMap<i32, String>,
    by_name: BTreeMap<String, i32>,
}

impl Maps {
    fn insert(&mut self, id: i32, name: String) {
        // A name maps to exactly one id: drop the stale one first
        if let Some(old) = self.by_name.remove(&name) {
            self.by_id.remove(&old);
        }
        self.by_id.insert(id, name.clone());
        self.by_name.insert(name, id);
    }

    fn remove(&mut self, name: &str) -> Option<i32> {
        let id = self.by_name.remove(name)?;
        self.by_id.remove(&id);
        Some(id)
    }
}

/// Thread-safe id <-> name registry.
pub struct SubscriptionRegistry {
    /// Next id to hand out.
    next_id: AtomicI32,
    /// Both directions, guarded together.
    maps: RwLock<Maps>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry whose first id is 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(0),
            maps: RwLock::new(Maps::default()),
        }
    }

    /// Reserves the next id for `name`.
    ///
    /// If `name` was registered before, its old id is retired.
    pub fn allocate(&self, name: &str) -> i32 {
        let mut maps = self.maps.write();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        maps.insert(id, name.to_owned());
        id
    }

    /// Returns the id of `name`, allocating one if it has none.
    ///
    /// The flag is true when a new id was allocated.
    pub fn id_or_allocate(&self, name: &str) -> (i32, bool) {
        if let Some(id) = self.id_for(name) {
            return (id, false);
        }
        let mut maps = self.maps.write();
        // Another caller may have won the race between the two locks
        if let Some(&id) = maps.by_name.get(name) {
            return (id, false);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        maps.insert(id, name.to_owned());
        (id, true)
    }

    /// Allocates a contiguous block: `base` gets the first id, `elements[i]` gets `first + 1 + i`.
    ///
    /// Returns the id of `base`.
    pub fn allocate_block(&self, base: &str, elements: &[String]) -> i32 {
        let count = i32::try_from(elements.len() + 1).unwrap_or(i32::MAX);
        let mut maps = self.maps.write();
        let first = self.next_id.fetch_add(count, Ordering::Relaxed);
        maps.insert(first, base.to_owned());
        for (id, name) in (first + 1..).zip(elements) {
            maps.insert(id, name.clone());
        }
        first
    }

    /// Removes `name`, returning the id it had.
    ///
    /// No-op returning `None` if `name` is absent or is the last entry.
    pub fn remove(&self, name: &str) -> Option<i32> {
        let mut maps = self.maps.write();
        if maps.by_name.len() <= 1 {
            return None;
        }
        maps.remove(name)
    }

    /// Looks up the id of `name`.
    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<i32> {
        self.maps.read().by_name.get(name).copied()
    }

    /// Looks up the name of `id`.
    #[must_use]
    pub fn name_for(&self, id: i32) -> Option<String> {
        self.maps.read().by_id.get(&id).cloned()
    }

    /// Snapshot of every `(id, name)` pair in id order.
    #[must_use]
    pub fn entries(&self) -> Vec<(i32, String)> {
        self.maps
            .read()
            .by_id
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    /// The id the next allocation will get, without reserving it.
    #[must_use]
    pub fn next_id(&self) -> i32 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a subscribed array lives: base id and element count.
///
/// Element `i` has id `base + 1 + i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayBlock {
    /// Id of the base name.
    pub base: i32,
    /// Declared element count.
    pub length: usize,
}

impl ArrayBlock {
    /// Id of the first element.
    #[must_use]
    pub const fn first_element(&self) -> i32 {
        self.base + 1
    }
}

/// Published array blocks, keyed by base name.
///
/// Base id and length are stored as one entry so a reader never pairs the
/// base of one declaration with the length of another.
#[derive(Default)]
pub struct ArrayTable {
    blocks: RwLock<HashMap<String, ArrayBlock>>,
}

impl ArrayTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current block of `name`.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<ArrayBlock> {
        self.blocks.read().get(name).copied()
    }

    /// Declared length of `name`.
    #[must_use]
    pub fn length(&self, name: &str) -> Option<usize> {
        self.block(name).map(|block| block.length)
    }

    /// Publishes `block` for `name`, returning the block it replaces.
    pub fn publish(&self, name: &str, block: ArrayBlock) -> Option<ArrayBlock> {
        self.blocks.write().insert(name.to_owned(), block)
    }

    /// Withdraws `name`, returning its block.
    pub fn remove(&self, name: &str) -> Option<ArrayBlock> {
        self.blocks.write().remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_wire_name() {
        assert_eq!(wire_name("a/b", None), "a/b");
        assert_eq!(wire_name("a/b", Some(3)), "a/b[3]");
    }

    #[test]
    fn test_allocate_and_lookup() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.allocate("a/b"), 0);
        assert_eq!(registry.allocate("c/d"), 1);
        assert_eq!(registry.id_for("a/b"), Some(0));
        assert_eq!(registry.name_for(1).as_deref(), Some("c/d"));
        assert_eq!(registry.id_for("missing"), None);
        assert_eq!(registry.name_for(7), None);
    }

    #[test]
    fn test_reallocate_retires_old_id() {
        let registry = SubscriptionRegistry::new();
        registry.allocate("a");
        registry.allocate("b");
        assert_eq!(registry.allocate("a"), 2);
        assert_eq!(registry.id_for("a"), Some(2));
        assert_eq!(registry.name_for(0), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_id_or_allocate_reuses() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.id_or_allocate("a"), (0, true));
        assert_eq!(registry.id_or_allocate("a"), (0, false));
        assert_eq!(registry.id_or_allocate("b"), (1, true));
    }

    #[test]
    fn test_remove_keeps_last_entry() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.remove("nothing"), None);
        registry.allocate("a");
        registry.allocate("b");
        assert_eq!(registry.remove("a"), Some(0));
        assert_eq!(registry.remove("b"), None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_for("b"), Some(1));
        // Removed ids are never handed out again
        assert_eq!(registry.allocate("a"), 2);
    }

    #[test]
    fn test_block_is_contiguous() {
        let registry = SubscriptionRegistry::new();
        registry.allocate("a/b");
        let elements: Vec<String> = (0..3).map(|i| format!("arr[{i}]")).collect();
        let base = registry.allocate_block("arr", &elements);
        assert_eq!(base, 1);
        assert_eq!(registry.id_for("arr[0]"), Some(2));
        assert_eq!(registry.id_for("arr[2]"), Some(4));
        assert_eq!(registry.allocate("next"), 5);
    }

    #[test]
    fn test_entries_in_id_order() {
        let registry = SubscriptionRegistry::new();
        registry.allocate("z");
        registry.allocate("a");
        let entries = registry.entries();
        assert_eq!(entries, vec![(0, "z".to_string()), (1, "a".to_string())]);
    }

    #[test]
    fn test_concurrent_allocation_unique() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..100).map(|i| registry.allocate(&format!("t{t}/d{i}"))).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(registry.len(), 800);
        for (id, name) in registry.entries() {
            assert_eq!(registry.id_for(&name), Some(id));
        }
    }

    #[test]
    fn test_array_table() {
        let table = ArrayTable::new();
        let first = ArrayBlock { base: 1, length: 3 };
        assert_eq!(table.block("arr"), None);
        assert_eq!(table.publish("arr", first), None);
        assert_eq!(table.length("arr"), Some(3));
        assert_eq!(first.first_element(), 2);

        let second = ArrayBlock { base: 5, length: 2 };
        assert_eq!(table.publish("arr", second), Some(first));
        assert_eq!(table.block("arr"), Some(second));
        assert_eq!(table.remove("arr"), Some(second));
        assert_eq!(table.length("arr"), None);
    }
}
