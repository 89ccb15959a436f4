//! Lockout policy configuration
//!
//! A [`LockoutPolicy`] is validated once when it is constructed and then
//! shared read-only by every evaluation for entities of that type.
//!
//! | Field           | Type               | Default | Constraint |
//! | --------------- | ------------------ | ------- | ---------- |
//! | `max_attempts`  | `u32`              | `3`     | `>= 1`     |
//! | `lock_duration` | `chrono::Duration` | 1 hour  | `> 0`      |

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCK_DURATION_SECS: i64 = 60 * 60;

/// Immutable lockout configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_duration: Duration::seconds(DEFAULT_LOCK_DURATION_SECS),
        }
    }
}

impl LockoutPolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxAttempts`] when `max_attempts` is zero and
    /// [`ConfigError::InvalidLockDuration`] when `lock_duration` is zero or negative.
    pub fn new(max_attempts: u32, lock_duration: Duration) -> Result<Self, ConfigError> {
        if max_attempts < 1 {
            return Err(ConfigError::InvalidMaxAttempts(max_attempts));
        }
        if lock_duration <= Duration::zero() {
            return Err(ConfigError::InvalidLockDuration(
                lock_duration.num_milliseconds(),
            ));
        }

        Ok(Self {
            max_attempts,
            lock_duration,
        })
    }

    pub fn builder() -> LockoutPolicyBuilder {
        LockoutPolicyBuilder::default()
    }

    /// Parse a policy from a JSON document such as
    /// `{"max_attempts": 5, "lock_duration_secs": 900}` or
    /// `{"lock_duration_ms": 1500}`.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: LockoutPolicyOptions =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::try_from(options)
    }

    /// Failed attempts at which a lock is imposed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// How long a newly imposed lock lasts.
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    /// Serializable form of this policy. The duration is written in
    /// milliseconds so sub-second locks survive a round trip.
    pub fn to_options(&self) -> LockoutPolicyOptions {
        LockoutPolicyOptions {
            max_attempts: Some(self.max_attempts),
            lock_duration_secs: None,
            lock_duration_ms: Some(self.lock_duration.num_milliseconds()),
        }
    }
}

/// Builder for [`LockoutPolicy`]. Unset fields fall back to the defaults.
#[derive(Debug, Default, Clone)]
pub struct LockoutPolicyBuilder {
    max_attempts: Option<u32>,
    lock_duration: Option<Duration>,
}

impl LockoutPolicyBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = Some(lock_duration);
        self
    }

    pub fn build(self) -> Result<LockoutPolicy, ConfigError> {
        LockoutPolicy::new(
            self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            self.lock_duration
                .unwrap_or_else(|| Duration::seconds(DEFAULT_LOCK_DURATION_SECS)),
        )
    }
}

/// Serializable policy options, e.g. from a configuration file.
///
/// The lock duration may be given in whole seconds or in milliseconds, not both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockoutPolicyOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_duration_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_duration_ms: Option<i64>,
}

impl TryFrom<LockoutPolicyOptions> for LockoutPolicy {
    type Error = ConfigError;

    fn try_from(options: LockoutPolicyOptions) -> Result<Self, Self::Error> {
        let mut builder = LockoutPolicy::builder();
        if let Some(max_attempts) = options.max_attempts {
            builder = builder.max_attempts(max_attempts);
        }
        let lock_duration = match (options.lock_duration_secs, options.lock_duration_ms) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Parse(
                    "lock_duration_secs and lock_duration_ms are mutually exclusive".to_string(),
                ));
            }
            (Some(secs), None) => Some(
                Duration::try_seconds(secs)
                    .ok_or(ConfigError::InvalidLockDuration(secs.saturating_mul(1000)))?,
            ),
            (None, Some(ms)) => Some(
                Duration::try_milliseconds(ms).ok_or(ConfigError::InvalidLockDuration(ms))?,
            ),
            (None, None) => None,
        };
        if let Some(lock_duration) = lock_duration {
            builder = builder.lock_duration(lock_duration);
        }
        builder.build()
    }
}
