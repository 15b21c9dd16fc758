//! Login Protection Module
//!
//! Brute-force lockout keyed by (username, source address), stored on a
//! [`TtlCache`](crate::cache::TtlCache).
//!
//! # States
//! - Untracked: no record stored
//! - Tracking: `1 <= attempt_count < max_attempts`
//! - Locked: `attempt_count >= max_attempts` until the lock window elapses,
//!   the user logs in successfully, or an admin unlocks the account

use std::time::Duration;

mod record;
mod service;

pub use record::{AccountLockInfo, AttemptRecord, Identity, LockoutPolicy};
pub use service::LoginProtectionService;

// == Public Constants ==
/// Failures allowed before an identity is locked
pub const MAX_ATTEMPTS: u32 = 5;

/// How long a lock holds
pub const LOCK_DURATION: Duration = Duration::from_secs(30 * 60);
