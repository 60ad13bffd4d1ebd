//! Shared Cache Module
//!
//! The public, clonable cache handle: one store behind one lock, plus the
//! per-entry expiration tasks that keep it trimmed.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::entry::EntryId;
use crate::cache::stats::{CacheStats, StatsCounter};
use crate::cache::store::CacheStore;
use crate::config::{CacheConfig, CacheOption};
use crate::error::Result;
use crate::tasks::spawn_expiry_task;

// == Shared State ==
/// State shared by every handle and every pending expiration task.
pub(crate) struct Shared<K, V> {
    store: RwLock<CacheStore<K, V>>,
    stats: StatsCounter,
    capacity: usize,
    ttl: Duration,
    reset_on_access: bool,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Expire ==
    /// Runs when an expiration task fires. Goes through the same removal
    /// path as a delete, and does nothing if the entry is already gone.
    pub(crate) async fn expire(&self, id: EntryId) {
        let expired = {
            let mut store = self.store.write().await;
            store.expire(id, Instant::now())
        };

        if expired {
            self.stats.record_expiration();
            debug!(slot = id.slot, stamp = id.stamp, "Entry expired");
        }
    }
}

// == Cache ==
/// Bounded, thread-safe cache that evicts the entry closest to expiring.
///
/// Every entry gets a deadline `ttl` after it was last written (and, unless
/// [`CacheOption::WithoutReset`] is given, after it was last read).
/// When the cache is full, inserting a new key evicts the entry whose deadline
/// comes first. Expired entries are removed by a background task per entry.
///
/// Cloning a `Cache` creates another handle to the same data. All methods
/// except [`Cache::cap`] must run inside a tokio runtime.
///
/// # Example
/// ```
/// use deadline_cache::{Cache, CacheOption};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> deadline_cache::Result<()> {
/// let cache = Cache::new(2, [CacheOption::ttl(Duration::from_secs(60))])?;
///
/// assert!(!cache.set("a", 1).await);
/// assert!(!cache.set("b", 2).await);
/// assert_eq!(cache.get(&"a").await, Some(1));
///
/// // "b" now has the earliest deadline, so it makes room for "c"
/// assert!(cache.set("c", 3).await);
/// assert_eq!(cache.get(&"b").await, None);
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.shared.capacity)
            .field("ttl", &self.shared.ttl)
            .field("reset_on_access", &self.shared.reset_on_access)
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// Fails with [`CacheError::InvalidConfig`](crate::CacheError::InvalidConfig)
    /// if `capacity` is not positive or the TTL option is negative. Without a
    /// TTL option entries never expire.
    pub fn new(capacity: i64, options: impl IntoIterator<Item = CacheOption>) -> Result<Self> {
        Self::with_config(CacheConfig::new(capacity).apply(options))
    }

    /// Creates a cache from a full configuration.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let config = config.validate()?;
        info!(
            capacity = config.capacity,
            ttl = ?config.ttl,
            reset_on_access = config.reset_on_access,
            "Cache created"
        );

        let store = CacheStore::new(config.capacity, config.ttl, config.reset_on_access);
        Ok(Self {
            shared: Arc::new(Shared {
                store: RwLock::new(store),
                stats: StatsCounter::default(),
                capacity: config.capacity,
                ttl: config.ttl,
                reset_on_access: config.reset_on_access,
            }),
        })
    }

    // == Set ==
    /// Stores a value. Returns true if another entry was evicted to make room.
    ///
    /// Updating an existing key replaces its value, resets its deadline and
    /// never evicts. [`CacheOption::WithoutReset`] only affects reads.
    pub async fn set(&self, key: K, value: V) -> bool {
        let evicted = {
            let mut store = self.shared.store.write().await;
            let outcome = store.set(key, value, Instant::now());
            if outcome.rearm {
                self.schedule(&mut store, outcome.id);
            }
            outcome.evicted
        };

        self.shared.stats.record_set();
        if evicted {
            self.shared.stats.record_eviction();
        }
        evicted
    }

    // == Get ==
    /// Returns a clone of the value if the key is present and not expired.
    ///
    /// With resets enabled and a TTL set, a hit pushes the entry's deadline
    /// forward. That moves it inside the expiration heap, so the read takes
    /// the exclusive lock in that case and the shared lock otherwise.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = if self.resets_on_read() {
            let mut store = self.shared.store.write().await;
            match store.touch(key, Instant::now()) {
                Some(id) => {
                    self.schedule(&mut store, id);
                    store.value(id).cloned()
                }
                None => None,
            }
        } else {
            let store = self.shared.store.read().await;
            store.peek(key, Instant::now()).cloned()
        };

        match value {
            Some(_) => self.shared.stats.record_hit(),
            None => self.shared.stats.record_miss(),
        }
        value
    }

    // == Contains ==
    /// Reports whether the key is live, without resetting its deadline.
    pub async fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let store = self.shared.store.read().await;
        store.contains(key, Instant::now())
    }

    // == Delete ==
    /// Removes a key. Returns true if it was present.
    pub async fn del<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.shared.store.write().await.remove(key);
        if removed {
            self.shared.stats.record_delete();
        }
        removed
    }

    // == Keys ==
    /// Snapshot of every live key, in no particular order.
    pub async fn keys(&self) -> Vec<K> {
        let store = self.shared.store.read().await;
        store.keys(Instant::now())
    }

    // == Length ==
    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let store = self.shared.store.read().await;
        store.live_len(Instant::now())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Purge ==
    /// Removes every entry and cancels every pending expiration task.
    pub async fn purge(&self) {
        let dropped = self.shared.store.write().await.purge();
        self.shared.stats.record_purge();
        debug!(dropped, "Cache purged");
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = self.len().await;
        self.shared.stats.snapshot(total_entries)
    }

    /// Spawns the expiration task for `id` at its current deadline.
    fn schedule(&self, store: &mut CacheStore<K, V>, id: EntryId) {
        if let Some(deadline) = store.deadline(id) {
            let timer = spawn_expiry_task(Arc::downgrade(&self.shared), id, deadline);
            store.arm(id, timer);
        }
    }

    fn resets_on_read(&self) -> bool {
        self.shared.reset_on_access && !self.shared.ttl.is_zero()
    }
}

impl<K, V> Cache<K, V> {
    // == Capacity ==
    /// Maximum number of entries. Fixed at construction, so no lock is taken.
    pub fn cap(&self) -> usize {
        self.shared.capacity
    }

    /// Expiration interval, zero when entries never expire.
    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    pub fn resets_on_access(&self) -> bool {
        self.shared.reset_on_access
    }
}
