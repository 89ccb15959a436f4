//! Lockout state and the lock status predicate
//!
//! The state lives on whatever entity the host application persists. The
//! core only touches it through [`LockoutFields`], so a host `User` struct can
//! carry the two fields under any name it likes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accessors the lockout evaluator needs on a host entity.
pub trait LockoutFields {
    /// Consecutive failed attempts since the last reset.
    fn attempts(&self) -> u32;

    fn set_attempts(&mut self, attempts: u32);

    /// When the current lock expires. `None` means no lock has been imposed.
    fn lock_until(&self) -> Option<DateTime<Utc>>;

    fn set_lock_until(&mut self, lock_until: Option<DateTime<Utc>>);

    /// Whether the entity is locked at `now`. See [`is_locked`].
    fn is_locked(&self, now: DateTime<Utc>) -> bool {
        is_locked(self.lock_until(), now)
    }
}

/// The lock status predicate.
///
/// An entity is locked iff `lock_until` is set and strictly after `now`. A lock
/// whose expiry equals `now` is no longer in force.
pub fn is_locked(lock_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    lock_until.is_some_and(|until| until > now)
}

/// Standalone lockout state, for hosts that store the two fields as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockoutFields for LockoutState {
    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    fn lock_until(&self) -> Option<DateTime<Utc>> {
        self.lock_until
    }

    fn set_lock_until(&mut self, lock_until: Option<DateTime<Utc>>) {
        self.lock_until = lock_until;
    }
}

/// Read-only view of an entity's lockout status at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub attempts: u32,
    pub is_locked: bool,
    /// Expiry of the lock in force, `None` when unlocked (including stale locks).
    pub locked_until: Option<DateTime<Utc>>,
    pub evaluated_at: DateTime<Utc>,
}

impl LockStatus {
    pub fn from_fields<F: LockoutFields + ?Sized>(fields: &F, now: DateTime<Utc>) -> Self {
        let is_locked = fields.is_locked(now);
        Self {
            attempts: fields.attempts(),
            is_locked,
            locked_until: if is_locked { fields.lock_until() } else { None },
            evaluated_at: now,
        }
    }

    /// Whole seconds until the lock lapses, rounded up. `None` when unlocked.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        let remaining = self.locked_until? - self.evaluated_at;
        let millis = remaining.num_milliseconds();
        Some((millis + 999) / 1000)
    }
}
