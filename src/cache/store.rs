//! Cache Store Module
//!
//! Eviction engine combining the key index, the entry arena and the expiration heap.
//!
//! The store does no locking and spawns nothing. Every time-dependent operation
//! takes `now` from the caller, which keeps the engine deterministic under test.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::arena::EntryArena;
use crate::cache::entry::{CacheEntry, EntryId};
use crate::cache::heap::ExpirationHeap;

// == Set Outcome ==
/// Result of [`CacheStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SetOutcome {
    /// Handle of the written entry
    pub id: EntryId,
    /// Whether the entry's deadline moved, so its expiration task must be re-armed
    pub rearm: bool,
    /// Whether another entry was evicted to make room
    pub evicted: bool,
}

// == Cache Store ==
/// Bounded store that evicts the entry closest to expiring.
#[derive(Debug)]
pub(crate) struct CacheStore<K, V> {
    /// Key index
    keys: HashMap<K, EntryId>,
    /// Entry storage addressed by handle
    arena: EntryArena<K, V>,
    /// Entries ordered by deadline
    heap: ExpirationHeap,
    /// Maximum number of entries allowed
    capacity: usize,
    /// Expiration interval, zero = never expires
    ttl: Duration,
    /// Whether reads push the deadline forward
    reset_on_access: bool,
    /// Next entry stamp; never reset, not even by purge
    next_stamp: u64,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, must be non-zero
    /// * `ttl` - Expiration interval, `Duration::ZERO` disables expiration
    /// * `reset_on_access` - Whether reads reset deadlines
    pub fn new(capacity: usize, ttl: Duration, reset_on_access: bool) -> Self {
        Self {
            keys: HashMap::with_capacity(capacity),
            arena: EntryArena::with_capacity(capacity),
            heap: ExpirationHeap::with_capacity(capacity),
            capacity,
            ttl,
            reset_on_access,
            next_stamp: 0,
        }
    }

    // == Accessors ==
    /// Whether entries carry a real deadline and need an expiration task.
    pub fn expires(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Whether a read of a live entry moves its deadline.
    pub fn resets_on_read(&self) -> bool {
        self.reset_on_access && self.expires()
    }

    // == Set ==
    /// Stores a key-value pair.
    ///
    /// An existing live key is updated in place: the value is replaced and
    /// the deadline reset, whether or not reads reset it. An update never
    /// evicts anything. A new key evicts the entry with the earliest deadline
    /// when the store is full, regardless of how recently that entry was read.
    pub fn set(&mut self, key: K, value: V, now: Instant) -> SetOutcome {
        if let Some(&id) = self.keys.get(&key) {
            if self.is_live(id, now) {
                if let Some(entry) = self.arena.get_mut(id) {
                    entry.value = value;
                }
                self.reset_deadline(id, now);
                return SetOutcome {
                    id,
                    rearm: self.expires(),
                    evicted: false,
                };
            }
            // past its deadline with the expiration task still pending
            self.remove_id(id);
        }

        let evicted = self.keys.len() >= self.capacity;
        if evicted {
            self.evict_next();
        }

        let id = self.insert(key, value, now);
        SetOutcome {
            id,
            rearm: self.expires(),
            evicted,
        }
    }

    fn insert(&mut self, key: K, value: V, now: Instant) -> EntryId {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        let entry = CacheEntry::new(key.clone(), value, now + self.ttl, stamp);
        let id = self.arena.insert(entry);
        self.heap.push(&mut self.arena, id.slot);
        self.keys.insert(key, id);
        id
    }

    fn evict_next(&mut self) {
        if let Some(slot) = self.heap.pop_min(&mut self.arena) {
            if let Some(entry) = self.remove_slot(slot) {
                debug!(slot, stamp = entry.stamp, "Evicted entry closest to expiring");
            }
        }
    }

    fn reset_deadline(&mut self, id: EntryId, now: Instant) {
        let Some(entry) = self.arena.get_mut(id) else {
            return;
        };
        entry.expires_at = now + self.ttl;
        let position = entry.heap_index;
        if let Some(index) = position {
            self.heap.fix(&mut self.arena, index);
        }
    }

    // == Touch ==
    /// Looks up a live entry for a read, resetting its deadline when the
    /// store resets on read.
    pub fn touch<Q>(&mut self, key: &Q, now: Instant) -> Option<EntryId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.keys.get(key)?;
        if !self.is_live(id, now) {
            return None;
        }
        if self.resets_on_read() {
            self.reset_deadline(id, now);
        }
        Some(id)
    }

    // == Peek ==
    /// Returns the value of a live entry without touching its deadline.
    pub fn peek<Q>(&self, key: &Q, now: Instant) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.keys.get(key)?;
        if !self.is_live(id, now) {
            return None;
        }
        self.value(id)
    }

    pub fn value(&self, id: EntryId) -> Option<&V> {
        self.arena.get(id).map(|entry| &entry.value)
    }

    pub fn deadline(&self, id: EntryId) -> Option<Instant> {
        self.arena.get(id).map(|entry| entry.expires_at)
    }

    fn is_live(&self, id: EntryId, now: Instant) -> bool {
        self.arena
            .get(id)
            .is_some_and(|entry| !self.expires() || !entry.is_expired_at(now))
    }

    // == Arm ==
    /// Attaches a pending expiration task to an entry.
    ///
    /// If the entry is already gone the task is aborted on the spot.
    pub fn arm(&mut self, id: EntryId, timer: AbortHandle) {
        match self.arena.get_mut(id) {
            Some(entry) => entry.arm(timer),
            None => timer.abort(),
        }
    }

    // == Remove ==
    /// Removes an entry by key. Returns true if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.keys.get(key) {
            Some(&id) => self.remove_id(id),
            None => false,
        }
    }

    // == Expire ==
    /// Removes the entry an expiration task was scheduled for.
    ///
    /// Does nothing if the entry is gone, was purged out of the heap, or had
    /// its deadline pushed back after the task was scheduled.
    pub fn expire(&mut self, id: EntryId, now: Instant) -> bool {
        let due = self.expires()
            && self
                .arena
                .get(id)
                .is_some_and(|entry| entry.heap_index.is_some() && entry.is_expired_at(now));
        if !due {
            return false;
        }
        // the running task is the timer being removed; don't abort ourselves
        if let Some(entry) = self.arena.get_mut(id) {
            entry.timer = None;
        }
        self.remove_id(id)
    }

    fn remove_id(&mut self, id: EntryId) -> bool {
        if self.arena.get(id).is_none() {
            return false;
        }
        self.remove_slot(id.slot).is_some()
    }

    /// Shared removal path for delete, eviction and expiration.
    fn remove_slot(&mut self, slot: usize) -> Option<CacheEntry<K, V>> {
        let position = self.arena.slot(slot)?.heap_index;
        if let Some(index) = position {
            self.heap.remove_at(&mut self.arena, index);
        }
        let mut entry = self.arena.remove(slot)?;
        entry.disarm();
        self.keys.remove(&entry.key);
        Some(entry)
    }

    // == Keys ==
    /// Returns every live key, in no particular order.
    pub fn keys(&self, now: Instant) -> Vec<K> {
        self.keys
            .iter()
            .filter(|&(_, &id)| self.is_live(id, now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn contains<Q>(&self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.keys
            .get(key)
            .is_some_and(|&id| self.is_live(id, now))
    }

    // == Length ==
    /// Number of entries whose deadline has not passed at `now`.
    pub fn live_len(&self, now: Instant) -> usize {
        if !self.expires() {
            return self.arena.len();
        }
        self.arena
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .count()
    }

    /// Number of stored entries, including any awaiting their expiration task.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    // == Purge ==
    /// Removes every entry. Returns how many were dropped.
    ///
    /// Positions are invalidated and timers aborted before the indices are
    /// replaced, so a task that is already waiting for the lock finds nothing
    /// to act on.
    pub fn purge(&mut self) -> usize {
        let dropped = self.keys.len();
        self.disarm_all();
        self.heap.clear(&mut self.arena);

        self.keys = HashMap::with_capacity(self.capacity);
        self.arena = EntryArena::with_capacity(self.capacity);
        self.heap = ExpirationHeap::with_capacity(self.capacity);
        dropped
    }

    fn disarm_all(&mut self) {
        for entry in self.arena.iter_mut() {
            entry.disarm();
        }
    }

    /// Asserts every structural invariant between the key index, arena and heap.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert_eq!(self.keys.len(), self.heap.len(), "key index and heap sizes differ");
        assert_eq!(self.keys.len(), self.arena.len(), "key index and arena sizes differ");
        assert!(self.keys.len() <= self.capacity, "capacity exceeded");

        for (key, &id) in &self.keys {
            let entry = self.arena.get(id).expect("indexed entry missing from arena");
            assert!(entry.key == *key, "arena entry holds another key");
            let index = entry.heap_index.expect("indexed entry missing from heap");
            assert_eq!(self.heap.as_slice()[index], id.slot, "stale heap position");
        }

        let nodes = self.heap.as_slice();
        for index in 1..nodes.len() {
            let parent = self.arena.slot(nodes[(index - 1) / 2]).map(|e| e.expires_at);
            let child = self.arena.slot(nodes[index]).map(|e| e.expires_at);
            assert!(parent <= child, "heap order violated at {index}");
        }
    }
}

impl<K, V> Drop for CacheStore<K, V> {
    fn drop(&mut self) {
        for entry in self.arena.iter_mut() {
            entry.disarm();
        }
    }
}
