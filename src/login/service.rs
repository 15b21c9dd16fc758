//! Login Protection Service
//!
//! Tracks failed logins per identity and decides when an identity is locked.
//! Every state change is a single atomic [`TtlCache::compute`] call, so
//! concurrent failures for one identity are never lost.
//!
//! When the cache cannot be updated the service logs the problem and answers
//! as if nothing were recorded: not locked, all attempts remaining.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::{Compute, TtlCache, SWEEP_INTERVAL};
use crate::clock::{Clock, SystemClock};
use crate::login::{AccountLockInfo, AttemptRecord, Identity, LockoutPolicy};

// == Login Protection Service ==
pub struct LoginProtectionService {
    attempts: TtlCache<Identity, AttemptRecord>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl LoginProtectionService {
    // == Constructors ==
    /// Creates the service on the system clock.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(policy: LockoutPolicy) -> Self {
        Self::with_settings(policy, Arc::new(SystemClock), SWEEP_INTERVAL)
    }

    /// Creates the service with an explicit clock and sweep interval.
    pub fn with_settings(
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        let attempts = TtlCache::with_settings("login-attempts", clock.clone(), sweep_interval);
        info!(
            max_attempts = policy.max_attempts,
            lock_minutes = policy.lock_duration.as_secs() / 60,
            "Login protection initialized"
        );

        Self {
            attempts,
            policy,
            clock,
        }
    }

    // == Record Failure ==
    /// Counts a failed login, locking the identity at the threshold.
    ///
    /// A record whose lock has already run out is discarded first, so the
    /// count restarts at 1.
    pub fn record_login_failure(&self, username: &str, ip: &str) {
        let identity = Identity::new(username, ip);
        let now = self.now();
        let policy = self.policy;
        let mut newly_locked = false;

        let result = self.attempts.compute(identity.clone(), |current| {
            let mut record = match current {
                Some(record) if !record.lock_elapsed(now, &policy) => record.clone(),
                _ => AttemptRecord::new(&identity, now),
            };
            newly_locked = record.register_failure(now, policy.max_attempts);
            let ttl = policy.record_ttl(record.locked);
            Compute::Put(record, ttl)
        });

        match result {
            Ok(Some(record)) => {
                if newly_locked {
                    info!(username, ip, "Account locked after {} failed attempts", record.attempt_count);
                } else {
                    debug!(username, ip, attempts = record.attempt_count, "Login failure recorded");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(username, ip, error = %e, "Failed to record login failure"),
        }
    }

    // == Record Success ==
    /// Forgets everything recorded for the identity.
    pub fn record_login_success(&self, username: &str, ip: &str) {
        self.attempts.invalidate(&Identity::new(username, ip));
        info!(username, ip, "Login succeeded, failure record cleared");
    }

    // == Is Locked ==
    /// True while the identity is inside its lock window.
    ///
    /// A lock that has run out is cleared here even if the sweep has not
    /// reached the record yet.
    pub fn is_account_locked(&self, username: &str, ip: &str) -> bool {
        let now = self.now();
        match self.settle(Identity::new(username, ip), now) {
            Some(record) if record.locked => {
                info!(
                    username,
                    ip,
                    remaining_minutes = record.remaining_lock_minutes(now, &self.policy),
                    "Account is locked"
                );
                true
            }
            _ => false,
        }
    }

    // == Remaining Attempts ==
    /// Failures left before the identity locks.
    pub fn remaining_attempts(&self, username: &str, ip: &str) -> u32 {
        let now = self.now();
        match self.live_record(&Identity::new(username, ip), now) {
            Some(record) => self.policy.max_attempts.saturating_sub(record.attempt_count),
            None => self.policy.max_attempts,
        }
    }

    // == Lock Info ==
    /// Read-only snapshot of the identity's lockout state.
    pub fn account_lock_info(&self, username: &str, ip: &str) -> AccountLockInfo {
        let identity = Identity::new(username, ip);
        let now = self.now();
        match self.live_record(&identity, now) {
            Some(record) => AccountLockInfo::from_record(&record, now, &self.policy),
            None => AccountLockInfo::untracked(&identity, &self.policy),
        }
    }

    // == Unlock ==
    /// Lifts a current lock, resetting the failure count.
    ///
    /// Returns false, changing nothing, when the identity is not locked.
    pub fn unlock_account(&self, username: &str, ip: &str) -> bool {
        let identity = Identity::new(username, ip);
        let now = self.now();
        let policy = self.policy;
        let mut unlocked = false;

        let result = self.attempts.compute(identity, |current| match current {
            Some(record) if record.lock_elapsed(now, &policy) => Compute::Remove,
            Some(record) if record.locked => {
                let mut record = record.clone();
                record.reset(now);
                unlocked = true;
                Compute::Put(record, policy.record_ttl(false))
            }
            _ => Compute::Keep,
        });

        if let Err(e) = result {
            warn!(username, ip, error = %e, "Failed to unlock account");
            return false;
        }

        if unlocked {
            info!(username, ip, "Account unlocked manually");
        } else {
            info!(username, ip, "Account not locked, nothing to unlock");
        }
        unlocked
    }

    // == Cache Maintenance ==
    /// Human-readable statistics of the attempt cache.
    pub fn cache_stats(&self) -> String {
        self.attempts.stats().to_string()
    }

    /// Drops every attempt record.
    pub fn clear_all_cache(&self) {
        let size = self.attempts.estimated_size();
        self.attempts.invalidate_all();
        info!("Cleared all login protection records ({} entries)", size);
    }

    /// Stops the attempt cache's background sweep.
    pub async fn shutdown(&self) {
        self.attempts.shutdown().await;
        info!("Login protection shut down");
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Current record, with a run-out lock removed atomically.
    fn settle(&self, identity: Identity, now: DateTime<Utc>) -> Option<AttemptRecord> {
        let policy = self.policy;
        let username = identity.username.clone();
        let mut expired = false;

        let result = self.attempts.compute(identity, |current| match current {
            Some(record) if record.lock_elapsed(now, &policy) => {
                expired = true;
                Compute::Remove
            }
            _ => Compute::Keep,
        });

        if expired {
            info!(username = %username, "Lock expired, record cleared");
        }
        result.unwrap_or_else(|e| {
            warn!(username = %username, error = %e, "Failed to read login record");
            None
        })
    }

    /// Current record without mutating the cache; a run-out lock reads as
    /// no record.
    fn live_record(&self, identity: &Identity, now: DateTime<Utc>) -> Option<AttemptRecord> {
        self.attempts
            .get_if_present(identity)
            .filter(|record| !record.lock_elapsed(now, &self.policy))
    }
}
