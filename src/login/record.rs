//! Login Attempt Records
//!
//! Per-identity attempt state stored in the login cache, and the read-only
//! views handed out to callers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::login::{LOCK_DURATION, MAX_ATTEMPTS};

// == Identity ==
/// Scope of attempt tracking: a username seen from one source address.
///
/// Both parts are compared exactly as given, with no case folding or
/// address normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
    pub ip: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ip: ip.into(),
        }
    }
}

// == Lockout Policy ==
/// Thresholds driving the lockout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lock
    pub max_attempts: u32,
    /// How long a lock holds
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    /// Cache TTL for a record in the given lock state.
    ///
    /// Locked records live for twice the lock window so they are still
    /// around when the lock is checked near its end.
    pub fn record_ttl(&self, locked: bool) -> Duration {
        if locked {
            self.lock_duration.saturating_mul(2)
        } else {
            self.lock_duration
        }
    }

    fn lock_duration_ms(&self) -> i64 {
        i64::try_from(self.lock_duration.as_millis()).unwrap_or(i64::MAX)
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lock_duration: LOCK_DURATION,
        }
    }
}

// == Attempt Record ==
/// Failure history for one identity.
///
/// `locked` is sticky; whether the lock still holds is always decided by
/// [`lock_elapsed`](AttemptRecord::lock_elapsed).
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub username: String,
    pub ip: String,
    pub attempt_count: u32,
    pub last_attempt_time: DateTime<Utc>,
    pub locked: bool,
    pub lock_time: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Fresh record with no failures counted yet.
    pub fn new(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            username: identity.username.clone(),
            ip: identity.ip.clone(),
            attempt_count: 0,
            last_attempt_time: now,
            locked: false,
            lock_time: None,
        }
    }

    /// Counts one failure, locking once the threshold is reached.
    ///
    /// Returns true if this failure raised the lock.
    pub fn register_failure(&mut self, now: DateTime<Utc>, max_attempts: u32) -> bool {
        let was_locked = self.locked;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempt_time = now;

        if self.attempt_count >= max_attempts {
            self.locked = true;
            self.lock_time = Some(now);
        }
        self.locked && !was_locked
    }

    /// Clears the failure count and any lock.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.attempt_count = 0;
        self.locked = false;
        self.lock_time = None;
        self.last_attempt_time = now;
    }

    /// True when the record is locked but its lock window has run out.
    ///
    /// A lock without a lock time counts as elapsed.
    pub fn lock_elapsed(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        if !self.locked {
            return false;
        }
        match self.lock_time {
            Some(lock_time) => {
                now.timestamp_millis() - lock_time.timestamp_millis() >= policy.lock_duration_ms()
            }
            None => true,
        }
    }

    /// True when the lock currently holds.
    pub fn is_locked_at(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        self.locked && !self.lock_elapsed(now, policy)
    }

    /// Whole minutes left in the lock window, floored, never negative.
    pub fn remaining_lock_minutes(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> i64 {
        let Some(lock_time) = self.lock_time else {
            return 0;
        };
        let unlock_at = lock_time
            .timestamp_millis()
            .saturating_add(policy.lock_duration_ms());
        (unlock_at - now.timestamp_millis()).max(0) / 60_000
    }
}

// == Account Lock Info ==
/// Snapshot of an identity's lockout state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLockInfo {
    pub username: String,
    pub ip: String,
    pub attempt_count: u32,
    pub locked: bool,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub lock_time: Option<DateTime<Utc>>,
    /// Minutes until the lock lifts, 0 when not locked
    pub remaining_lock_minutes: i64,
    pub remaining_attempts: u32,
}

impl AccountLockInfo {
    /// View of an identity with nothing recorded.
    pub fn untracked(identity: &Identity, policy: &LockoutPolicy) -> Self {
        Self {
            username: identity.username.clone(),
            ip: identity.ip.clone(),
            attempt_count: 0,
            locked: false,
            last_attempt_time: None,
            lock_time: None,
            remaining_lock_minutes: 0,
            remaining_attempts: policy.max_attempts,
        }
    }

    /// View of a live record at `now`.
    pub fn from_record(
        record: &AttemptRecord,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> Self {
        let locked = record.is_locked_at(now, policy);
        let (lock_time, remaining_lock_minutes, remaining_attempts) = if locked {
            (record.lock_time, record.remaining_lock_minutes(now, policy), 0)
        } else {
            (
                None,
                0,
                policy.max_attempts.saturating_sub(record.attempt_count),
            )
        };

        Self {
            username: record.username.clone(),
            ip: record.ip.clone(),
            attempt_count: record.attempt_count,
            locked,
            last_attempt_time: Some(record.last_attempt_time),
            lock_time,
            remaining_lock_minutes,
            remaining_attempts,
        }
    }
}
