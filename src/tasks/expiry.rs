//! Entry Expiration Task
//!
//! One-shot background task per entry that removes it once its deadline passes.

use std::hash::Hash;
use std::sync::Weak;

use tokio::task::AbortHandle;
use tokio::time::{self, Instant};
use tracing::trace;

use crate::cache::{EntryId, Shared};

/// Spawns a task that sleeps until `deadline` and then asks the cache to
/// expire entry `id`.
///
/// The task holds only a weak reference, so it never keeps a dropped cache
/// alive. Every reset of the entry's deadline aborts this task and spawns a
/// new one; the returned handle is what gets aborted.
///
/// Aborting is best effort. A task that already woke up and is waiting for
/// the lock still runs, and the cache treats it as a no-op when the entry is
/// gone or its deadline has moved.
///
/// # Arguments
/// * `cache` - Weak reference to the shared cache state
/// * `id` - Handle of the entry to expire
/// * `deadline` - When the entry expires
pub(crate) fn spawn_expiry_task<K, V>(
    cache: Weak<Shared<K, V>>,
    id: EntryId,
    deadline: Instant,
) -> AbortHandle
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        time::sleep_until(deadline).await;

        match cache.upgrade() {
            Some(cache) => cache.expire(id).await,
            None => trace!(slot = id.slot, "Cache dropped before entry expired"),
        }
    });
    task.abort_handle()
}
