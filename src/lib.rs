//! Deadline Cache - a bounded in-memory cache with per-entry expiration
//!
//! Every entry expires a fixed TTL after it was last written (or read, unless
//! resets are disabled). When the cache is full, the entry closest to expiring
//! is evicted, not the least recently used one.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheStats};
pub use config::{CacheConfig, CacheOption};
pub use error::{CacheError, Result};
