//! Cache Entry Module
//!
//! Defines individual cache entries and the handles that address them.

use tokio::task::AbortHandle;
use tokio::time::Instant;

// == Entry Id ==
/// Stable handle to an entry in the arena.
///
/// `slot` is the arena position and may be reused once the entry is gone.
/// `stamp` is unique for the lifetime of the cache, so a stale handle never
/// matches an entry created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntryId {
    pub(crate) slot: usize,
    pub(crate) stamp: u64,
}

// == Cache Entry ==
/// A single cache entry with its deadline and expiration bookkeeping.
#[derive(Debug)]
pub(crate) struct CacheEntry<K, V> {
    /// The key, kept so that heap-driven removal can clear the key index
    pub key: K,
    /// The stored value
    pub value: V,
    /// Absolute deadline, also the heap ordering key
    pub expires_at: Instant,
    /// Position in the expiration heap, None once removed from it
    pub(crate) heap_index: Option<usize>,
    /// Pending expiration task, if one was scheduled
    pub(crate) timer: Option<AbortHandle>,
    pub(crate) stamp: u64,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates an entry that is not yet part of the heap.
    pub(crate) fn new(key: K, value: V, expires_at: Instant, stamp: u64) -> Self {
        Self {
            key,
            value,
            expires_at,
            heap_index: None,
            timer: None,
            stamp,
        }
    }

    // == Is Expired ==
    /// Checks if the entry's deadline has passed at `now`.
    ///
    /// An entry is expired once `now` reaches `expires_at`, so a deadline of
    /// exactly `now` is already gone.
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Replaces the pending expiration task, aborting the previous one.
    pub(crate) fn arm(&mut self, timer: AbortHandle) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }

    /// Aborts the pending expiration task, if any.
    ///
    /// A task that already started waiting for the lock is not stopped by
    /// this; it finds its entry gone and does nothing.
    pub(crate) fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
