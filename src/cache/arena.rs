//! Entry Arena Module
//!
//! Slab of cache entries addressed by slot number, with a free list for reuse.

use tokio::time::Instant;

use crate::cache::entry::{CacheEntry, EntryId};
use crate::cache::heap::HeapSlots;

// == Entry Arena ==
#[derive(Debug)]
pub(crate) struct EntryArena<K, V> {
    entries: Vec<Option<CacheEntry<K, V>>>,
    free: Vec<usize>,
    len: usize,
}

impl<K, V> EntryArena<K, V> {
    // == Constructor ==
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Insert ==
    /// Stores `entry` in a free slot and returns its handle.
    pub fn insert(&mut self, entry: CacheEntry<K, V>) -> EntryId {
        let stamp = entry.stamp;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.len += 1;
        EntryId { slot, stamp }
    }

    // == Remove ==
    /// Takes the entry out of `slot`, leaving it free for reuse.
    pub fn remove(&mut self, slot: usize) -> Option<CacheEntry<K, V>> {
        let entry = self.entries.get_mut(slot)?.take()?;
        self.free.push(slot);
        self.len -= 1;
        Some(entry)
    }

    // == Lookup ==
    /// Entry addressed by `id`, None if it was removed since.
    pub fn get(&self, id: EntryId) -> Option<&CacheEntry<K, V>> {
        self.slot(id.slot).filter(|entry| entry.stamp == id.stamp)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut CacheEntry<K, V>> {
        self.entries
            .get_mut(id.slot)?
            .as_mut()
            .filter(|entry| entry.stamp == id.stamp)
    }

    /// Entry in `slot`, whoever owns it now.
    pub fn slot(&self, slot: usize) -> Option<&CacheEntry<K, V>> {
        self.entries.get(slot)?.as_ref()
    }

    /// Iterates over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CacheEntry<K, V>)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot, entry)))
    }

    /// Iterates mutably over occupied slots.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CacheEntry<K, V>> {
        self.entries.iter_mut().flatten()
    }
}

impl<K, V> HeapSlots for EntryArena<K, V> {
    fn deadline(&self, slot: usize) -> Option<Instant> {
        self.slot(slot).map(|entry| entry.expires_at)
    }

    fn set_heap_index(&mut self, slot: usize, index: Option<usize>) {
        if let Some(Some(entry)) = self.entries.get_mut(slot) {
            entry.heap_index = index;
        }
    }
}
