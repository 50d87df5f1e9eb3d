//! Single-flight tracking of tiles currently being fetched.
//!
//! Each registered tile carries a [`Ticket`] identifying the chain walk that
//! owns it. Completions present their ticket; once the registry is cleared
//! (teardown or source switch) or the tile has been re-registered, old tickets no longer match
//! and the completion is ignored.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::coord::TileKey;

/// Identifies one chain walk for one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Set of tiles with an active chain walk.
///
/// Backed by a sharded `DashMap` so the common "already in flight" check on
/// the request path does not contend on a single lock, while the insert is
/// still atomic per key.
pub struct InFlightRegistry {
    entries: DashMap<TileKey, Ticket>,
    next_ticket: AtomicU64,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Whether `key` is in flight. May race with concurrent inserts.
    pub fn contains(&self, key: TileKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Registers `key` if absent, returning the new ticket.
    ///
    /// Returns `None` when another walk already owns the key.
    pub fn try_insert(&self, key: TileKey) -> Option<Ticket> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
                vacant.insert(ticket);
                Some(ticket)
            }
        }
    }

    /// Whether `ticket` still owns `key`.
    pub fn is_current(&self, key: TileKey, ticket: Ticket) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|owner| *owner == ticket)
    }

    /// Removes `key` if `ticket` owns it. Safe to call on non-members.
    pub fn remove(&self, key: TileKey, ticket: Ticket) -> bool {
        self.entries
            .remove_if(&key, |_, owner| *owner == ticket)
            .is_some()
    }

    /// Removes every key, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Removes every key present at the time of the call and returns them.
    ///
    /// Keys registered while this runs may survive; their tickets were
    /// issued after the call started.
    pub fn retire_all(&self) -> Vec<TileKey> {
        self.keys()
            .into_iter()
            .filter(|key| self.entries.remove(key).is_some())
            .collect()
    }

    /// Number of tiles in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the keys in flight.
    pub fn keys(&self) -> Vec<TileKey> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn key(x: u32) -> TileKey {
        TileKey::new(8, x, 0).unwrap()
    }

    #[test]
    fn test_insert_once() {
        let registry = InFlightRegistry::new();
        assert!(registry.try_insert(key(1)).is_some());
        assert!(registry.try_insert(key(1)).is_none());
        assert!(registry.contains(key(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_requires_matching_ticket() {
        let registry = InFlightRegistry::new();
        let first = registry.try_insert(key(1)).unwrap();
        registry.clear();
        let second = registry.try_insert(key(1)).unwrap();

        assert_ne!(first, second);
        assert!(!registry.is_current(key(1), first));
        assert!(!registry.remove(key(1), first));
        assert!(registry.contains(key(1)));

        assert!(registry.remove(key(1), second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_idempotent() {
        let registry = InFlightRegistry::new();
        let ticket = registry.try_insert(key(1)).unwrap();
        assert!(registry.remove(key(1), ticket));
        assert!(!registry.remove(key(1), ticket));
    }

    #[test]
    fn test_clear_returns_count() {
        let registry = InFlightRegistry::new();
        registry.try_insert(key(1));
        registry.try_insert(key(2));
        assert_eq!(registry.clear(), 2);
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn test_retire_all_invalidates_tickets() {
        let registry = InFlightRegistry::new();
        let first = registry.try_insert(key(1)).unwrap();
        registry.try_insert(key(2));

        let mut retired = registry.retire_all();
        retired.sort_by_key(|k| k.x());

        assert_eq!(retired, vec![key(1), key(2)]);
        assert!(registry.is_empty());
        assert!(!registry.is_current(key(1), first));
        assert!(registry.retire_all().is_empty());
    }

    #[test]
    fn test_concurrent_inserts_single_winner() {
        let registry = Arc::new(InFlightRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.try_insert(key(7)).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
