//! Cache Module
//!
//! Provides a bounded in-memory cache whose eviction order is the order in
//! which entries expire.

mod arena;
mod entry;
mod heap;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use shared::Cache;
pub use stats::CacheStats;

pub(crate) use entry::EntryId;
pub(crate) use shared::Shared;
