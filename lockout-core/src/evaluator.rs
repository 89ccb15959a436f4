//! The lockout state transition.
//!
//! [`evaluate`] is called once per reported failure. It is synchronous, never
//! fails and never reads the clock; the caller supplies `now` and is
//! responsible for persisting the mutated state.
//!
//! | Prior state                       | Next state                                   | Decision             |
//! | --------------------------------- | -------------------------------------------- | -------------------- |
//! | `lock_until < now`                | `attempts = 1`, `lock_until = None`          | `Restarted`          |
//! | locked (`lock_until > now`)       | `attempts += 1`, lock untouched              | `CountedWhileLocked` |
//! | unlocked, `attempts + 1 >= max`   | `attempts += 1`, `lock_until = now + period` | `Locked`             |
//! | unlocked, below threshold         | `attempts += 1`                              | `Counted`            |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{policy::LockoutPolicy, state::LockoutFields};

/// What a single evaluation did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// A stale lock was cleared and counting restarted at 1.
    Restarted,
    /// The failure was counted and the threshold was not reached.
    Counted,
    /// The threshold was reached and a new lock was imposed.
    Locked { until: DateTime<Utc> },
    /// The entity was already locked; the failure was counted and the lock left as is.
    CountedWhileLocked { until: DateTime<Utc> },
}

impl Decision {
    /// Whether this evaluation imposed a new lock.
    pub fn newly_locked(&self) -> bool {
        matches!(self, Decision::Locked { .. })
    }
}

/// Apply one failed attempt to `state` under `policy` at `now`.
pub fn evaluate<F>(state: &mut F, policy: &LockoutPolicy, now: DateTime<Utc>) -> Decision
where
    F: LockoutFields + ?Sized,
{
    let was_locked = state.is_locked(now);

    let decision = match state.lock_until() {
        Some(until) if until < now => {
            state.set_attempts(1);
            state.set_lock_until(None);
            Decision::Restarted
        }
        lock_until => {
            let attempts = state.attempts().saturating_add(1);
            state.set_attempts(attempts);

            match lock_until {
                Some(until) if was_locked => Decision::CountedWhileLocked { until },
                _ if attempts >= policy.max_attempts() => {
                    let until = now
                        .checked_add_signed(policy.lock_duration())
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    state.set_lock_until(Some(until));
                    Decision::Locked { until }
                }
                _ => Decision::Counted,
            }
        }
    };

    tracing::debug!(
        attempts = state.attempts(),
        ?decision,
        "Evaluated failed attempt"
    );

    decision
}
