//! Lockout service for recording failed login attempts.
//!
//! The service runs the [`evaluate`](crate::evaluator::evaluate) transition at
//! the clock's current instant, hands the result to a [`LockoutGateway`] and
//! returns whatever the gateway returns.
//!
//! # Example
//!
//! ```rust,ignore
//! use lockout_core::{InMemoryLockoutStore, LockoutPolicy, LockoutService};
//!
//! let service = LockoutService::new(Arc::new(InMemoryLockoutStore::new()), LockoutPolicy::default());
//!
//! // Check before verifying credentials
//! if service.lock_status_for_key("user@example.com").await?.is_locked {
//!     // Reject without checking the password
//! }
//!
//! // After a failed credential check
//! let record = service.record_failed_attempt_for_key("user@example.com").await?;
//!
//! // After a successful login
//! service.reset("user@example.com").await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    Error,
    clock::{Clock, SystemClock},
    evaluator::{Decision, evaluate},
    events::{Event, EventBus},
    policy::LockoutPolicy,
    record::LockoutRecord,
    repositories::{LockoutGateway, LockoutStore},
    state::{LockStatus, LockoutFields},
};

/// Service for recording failed attempts and reporting lock status.
///
/// # Thread Safety
///
/// The service can be shared across tasks. Snapshot operations
/// (`record_failed_attempt*`) do not serialize anything: the caller owns the
/// snapshot and must follow the [`LockoutGateway`] concurrency contract.
/// Key-addressed operations on a [`LockoutStore`] hold a per-key mutex for the
/// whole find → evaluate → save cycle, so concurrent reports for one key are
/// counted exactly within this process.
pub struct LockoutService<G: LockoutGateway> {
    gateway: Arc<G>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<G: LockoutGateway> LockoutService<G> {
    /// Create a new LockoutService using the system clock.
    pub fn new(gateway: Arc<G>, policy: LockoutPolicy) -> Self {
        Self {
            gateway,
            policy,
            clock: Arc::new(SystemClock),
            events: None,
            key_locks: DashMap::new(),
        }
    }

    /// Replace the clock used to read the current instant.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Emit security events to `events` after each successful save.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Lock status of `entity` at the clock's current instant.
    pub fn lock_status<F: LockoutFields + ?Sized>(&self, entity: &F) -> LockStatus {
        LockStatus::from_fields(entity, self.now())
    }

    pub fn is_locked<F: LockoutFields + ?Sized>(&self, entity: &F) -> bool {
        entity.is_locked(self.now())
    }

    /// Record a failed attempt on `entity` and save it.
    ///
    /// # Returns
    ///
    /// The entity as returned by the gateway, or the gateway's error unchanged.
    pub async fn record_failed_attempt(&self, entity: G::Entity) -> Result<G::Entity, Error> {
        self.evaluate_and_save(entity, None).await
    }

    /// Record a failed attempt and return `value` instead of the saved entity.
    ///
    /// Handy when the failure report is one step of a larger workflow that
    /// already knows what it wants to hand back to its caller.
    pub async fn record_failed_attempt_returning<T>(
        &self,
        entity: G::Entity,
        value: T,
    ) -> Result<T, Error> {
        self.evaluate_and_save(entity, None).await?;
        Ok(value)
    }

    /// Record a failed attempt and deliver the outcome to `callback`.
    pub async fn record_failed_attempt_with_callback<C>(&self, entity: G::Entity, callback: C)
    where
        C: FnOnce(Result<G::Entity, Error>) + Send,
    {
        callback(self.evaluate_and_save(entity, None).await);
    }

    async fn evaluate_and_save(
        &self,
        mut entity: G::Entity,
        key: Option<&str>,
    ) -> Result<G::Entity, Error> {
        let now = self.now();
        let previous_lock = entity.lock_until();
        let decision = evaluate(&mut entity, &self.policy, now);

        let saved = self.gateway.save(entity).await.map_err(|e| {
            tracing::warn!(key, error = %e, "Failed to persist lockout state");
            e
        })?;

        match decision {
            Decision::Locked { until } => {
                tracing::info!(
                    key,
                    attempts = saved.attempts(),
                    locked_until = %until,
                    "Account locked after repeated failed attempts"
                );
            }
            Decision::Restarted => {
                tracing::info!(key, "Expired lock cleared, attempt count restarted");
            }
            Decision::Counted | Decision::CountedWhileLocked { .. } => {
                tracing::debug!(key, attempts = saved.attempts(), "Failed attempt recorded");
            }
        }

        self.emit_decision(key, decision, previous_lock, saved.attempts(), now)
            .await;

        Ok(saved)
    }

    async fn emit_decision(
        &self,
        key: Option<&str>,
        decision: Decision,
        previous_lock: Option<DateTime<Utc>>,
        attempts: u32,
        now: DateTime<Utc>,
    ) {
        if self.events.is_none() {
            return;
        }

        let key = key.map(str::to_string);
        let mut events = Vec::with_capacity(2);

        if let (Decision::Restarted, Some(expired_at)) = (decision, previous_lock) {
            events.push(Event::LockRestarted {
                key: key.clone(),
                expired_at,
                timestamp: now,
            });
        }

        events.push(Event::AttemptRecorded {
            key: key.clone(),
            attempts,
            is_locked: matches!(
                decision,
                Decision::Locked { .. } | Decision::CountedWhileLocked { .. }
            ),
            timestamp: now,
        });

        if let Decision::Locked { until } = decision {
            events.push(Event::AccountLocked {
                key,
                attempts,
                locked_until: until,
                timestamp: now,
            });
        }

        for event in &events {
            self.emit(event).await;
        }
    }

    async fn emit(&self, event: &Event) {
        if let Some(events) = &self.events {
            if let Err(e) = events.emit(event).await {
                tracing::warn!(error = %e, ?event, "Failed to emit lockout event");
            }
        }
    }
}

impl<S: LockoutStore> LockoutService<S> {
    /// Record a failed attempt for the record stored under `key`.
    ///
    /// A record is created on the first failure. The find → evaluate → save
    /// cycle holds the per-key mutex.
    pub async fn record_failed_attempt_for_key(&self, key: &str) -> Result<LockoutRecord, Error> {
        let key_lock = self.key_lock(key);
        let _guard = key_lock.lock().await;
        self.record_for_key_locked(key).await
    }

    async fn record_for_key_locked(&self, key: &str) -> Result<LockoutRecord, Error> {
        let record = match self.gateway.find(key).await? {
            Some(record) => record,
            None => LockoutRecord::new(key, self.now()),
        };
        self.evaluate_and_save(record, Some(key)).await
    }

    /// Lock status for `key`. Keys with no record are unlocked with zero attempts.
    pub async fn lock_status_for_key(&self, key: &str) -> Result<LockStatus, Error> {
        let now = self.now();
        Ok(match self.gateway.find(key).await? {
            Some(record) => LockStatus::from_fields(&record, now),
            None => LockStatus {
                attempts: 0,
                is_locked: false,
                locked_until: None,
                evaluated_at: now,
            },
        })
    }

    pub async fn is_locked_for_key(&self, key: &str) -> Result<bool, Error> {
        Ok(self.lock_status_for_key(key).await?.is_locked)
    }

    /// Clear attempts and any lock for `key`, e.g. after a successful login.
    ///
    /// # Returns
    ///
    /// `true` if the record was locked before the reset.
    pub async fn reset(&self, key: &str) -> Result<bool, Error> {
        let key_lock = self.key_lock(key);
        let _guard = key_lock.lock().await;
        self.reset_locked(key).await
    }

    async fn reset_locked(&self, key: &str) -> Result<bool, Error> {
        let Some(mut record) = self.gateway.find(key).await? else {
            return Ok(false);
        };

        let now = self.now();
        let was_locked = record.is_locked(now);
        if record.attempts == 0 && record.lock_until.is_none() {
            return Ok(false);
        }

        record.set_attempts(0);
        record.set_lock_until(None);
        self.gateway.save(record).await?;

        tracing::info!(key, was_locked, "Lockout attempts reset");
        self.emit(&Event::AttemptsReset {
            key: key.to_string(),
            was_locked,
            timestamp: now,
        })
        .await;

        Ok(was_locked)
    }

    fn key_lock<'a>(&'a self, key: &'a str) -> KeyLock<'a> {
        let lock = self
            .key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyLock {
            locks: &self.key_locks,
            key,
            lock,
        }
    }
}

/// Handle on one entry of the keyed-lock table.
///
/// Dropping it removes the entry once no other task holds or waits on it,
/// including when the owning future is cancelled while waiting.
struct KeyLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl KeyLock<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        // the table and this handle are the only owners
        self.locks.remove_if(self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}
