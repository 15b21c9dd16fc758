//! Cache Module
//!
//! Provides a generic in-memory cache with per-entry TTL, lazy expiry on read
//! and a periodic background sweep.

use std::time::Duration;

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::{Compute, TtlCache};

// == Public Constants ==
/// TTL used by [`TtlCache::put_default`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval between background sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for the sweep task before aborting it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
