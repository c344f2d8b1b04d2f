//! # Handle table: integer handles for foreign callers.
//!
//! [`HandleTable`] maps small positive integers to shared objects so that a
//! non-Rust host can refer to them without holding pointers.
//!
//! ## Rules
//! - Handles live in `[1, max_id]`; `0` ([`INVALID_HANDLE`]) is never issued.
//! - Allocation starts at the slot after the last one issued, wraps around and
//!   skips handles still in use.
//! - Insertion fails with [`INVALID_HANDLE`] once `limit` handles are live.
//! - Lookups and removals are O(1) under a short lock; the object itself is
//!   returned as an `Arc` so callers never block the table while using it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque identifier handed across the foreign boundary.
pub type Handle = i64;

/// The handle returned when allocation fails.
pub const INVALID_HANDLE: Handle = 0;

/// Largest handle value issued; fits a C `int`.
pub const MAX_HANDLE: Handle = i32::MAX as Handle;

/// Thread-safe map from handles to shared objects.
pub struct HandleTable<T> {
    inner: Mutex<Slots<T>>,
    limit: usize,
    max_id: Handle,
}

struct Slots<T> {
    next: Handle,
    items: HashMap<Handle, Arc<T>>,
}

impl<T> HandleTable<T> {
    /// Creates a table holding at most `limit` live handles (min 1).
    pub fn new(limit: usize) -> Self {
        Self::with_id_range(limit, MAX_HANDLE)
    }

    fn with_id_range(limit: usize, max_id: Handle) -> Self {
        Self {
            inner: Mutex::new(Slots {
                next: 1,
                items: HashMap::new(),
            }),
            limit: limit.max(1),
            max_id: max_id.max(1),
        }
    }

    /// Stores `value` and returns its handle, or [`INVALID_HANDLE`] when full.
    ///
    /// On failure `value` is dropped before returning.
    pub fn insert(&self, value: T) -> Handle {
        let value = Arc::new(value);
        let handle = {
            let mut slots = self.inner.lock();
            if slots.items.len() >= self.limit {
                None
            } else {
                self.allocate(&mut slots).inspect(|h| {
                    slots.items.insert(*h, value.clone());
                })
            }
        };
        handle.unwrap_or_else(|| {
            tracing::warn!(limit = self.limit, "handle table full");
            INVALID_HANDLE
        })
    }

    fn allocate(&self, slots: &mut Slots<T>) -> Option<Handle> {
        for _ in 0..=slots.items.len() {
            let candidate = slots.next;
            slots.next = if candidate >= self.max_id { 1 } else { candidate + 1 };
            if !slots.items.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Returns the object behind `handle`, if live.
    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        self.inner.lock().items.get(&handle).cloned()
    }

    /// Removes `handle`, returning its object so it can be released outside the lock.
    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        self.inner.lock().items.remove(&handle)
    }

    /// Removes every live handle.
    pub fn drain(&self) -> Vec<Arc<T>> {
        self.inner.lock().items.drain().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.len())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_start_at_one() {
        let table = HandleTable::new(8);
        assert_eq!(table.insert("a"), 1);
        assert_eq!(table.insert("b"), 2);
        assert_eq!(table.get(1).as_deref(), Some(&"a"));
        assert!(table.get(INVALID_HANDLE).is_none());
        assert!(table.get(-1).is_none());
    }

    #[test]
    fn test_removed_handle_is_not_reused_immediately() {
        let table = HandleTable::new(8);
        let a = table.insert(1);
        assert_eq!(table.remove(a).as_deref(), Some(&1));
        assert!(table.remove(a).is_none());
        assert_ne!(table.insert(2), a);
    }

    #[test]
    fn test_wraps_and_skips_live_handles() {
        let table = HandleTable::with_id_range(8, 3);
        assert_eq!(table.insert('a'), 1);
        assert_eq!(table.insert('b'), 2);
        assert_eq!(table.insert('c'), 3);
        table.remove(2);
        assert_eq!(table.insert('d'), 2);
        assert_eq!(table.insert('e'), INVALID_HANDLE);
    }

    #[test]
    fn test_limit() {
        let table = HandleTable::new(2);
        assert_ne!(table.insert(()), INVALID_HANDLE);
        assert_ne!(table.insert(()), INVALID_HANDLE);
        assert_eq!(table.insert(()), INVALID_HANDLE);
        assert_eq!(table.len(), 2);

        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_inserts_are_unique() {
        let table = Arc::new(HandleTable::new(1 << 12));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || (0..256).map(|i| table.insert(i)).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<Handle> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1024);
        assert!(!all.contains(&INVALID_HANDLE));
    }
}
