//! Configuration Module
//!
//! Cache options and loading of cache settings from environment variables.

use std::env;

use chrono::Duration;

use crate::error::{CacheError, Result};

// == Cache Option ==
/// A single construction option, applied in order by [`CacheConfig::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOption {
    /// Per-cache expiration interval. Zero disables expiration, negative is rejected.
    Ttl(Duration),
    /// Stop reads and updates from pushing an entry's deadline forward.
    WithoutReset,
}

impl CacheOption {
    /// Shorthand for `CacheOption::Ttl` from a std duration.
    pub fn ttl(ttl: std::time::Duration) -> Self {
        // saturate instead of failing: anything this large never expires in practice
        CacheOption::Ttl(Duration::from_std(ttl).unwrap_or(Duration::MAX))
    }
}

/// Cache configuration parameters.
///
/// Values are unvalidated until [`CacheConfig::validate`] runs, so a config can
/// carry whatever the caller or the environment supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: i64,
    /// Expiration interval, zero = entries never expire
    pub ttl: Duration,
    /// Whether reads and updates reset an entry's deadline
    pub reset_on_access: bool,
}

/// Configuration after validation: what the store is actually built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Validated {
    pub capacity: usize,
    pub ttl: std::time::Duration,
    pub reset_on_access: bool,
}

impl CacheConfig {
    /// Creates a config with the given capacity and default options.
    pub fn new(capacity: i64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL_MS` - Expiration interval in milliseconds, 0 disables (default: 0)
    /// - `CACHE_RESET_ON_ACCESS` - Reset deadlines on access (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.capacity),
            ttl: env::var("CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .and_then(Duration::try_milliseconds)
                .unwrap_or(defaults.ttl),
            reset_on_access: env::var("CACHE_RESET_ON_ACCESS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reset_on_access),
        }
    }

    // == Apply ==
    /// Applies construction options on top of this config.
    pub fn apply(mut self, options: impl IntoIterator<Item = CacheOption>) -> Self {
        for option in options {
            match option {
                CacheOption::Ttl(ttl) => self.ttl = ttl,
                CacheOption::WithoutReset => self.reset_on_access = false,
            }
        }
        self
    }

    // == Validate ==
    /// Rejects non-positive capacities and negative TTLs.
    pub(crate) fn validate(&self) -> Result<Validated> {
        if self.capacity <= 0 {
            return Err(CacheError::InvalidConfig(format!(
                "capacity must be positive, got {}",
                self.capacity
            )));
        }
        let capacity = usize::try_from(self.capacity).map_err(|_| {
            CacheError::InvalidConfig(format!("capacity {} does not fit", self.capacity))
        })?;
        let ttl = self.ttl.to_std().map_err(|_| {
            CacheError::InvalidConfig(format!("ttl must not be negative, got {}", self.ttl))
        })?;

        Ok(Validated {
            capacity,
            ttl,
            reset_on_access: self.reset_on_access,
        })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::zero(),
            reset_on_access: true,
        }
    }
}
