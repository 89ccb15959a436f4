//! The lockout record used by the bundled stores
//!
//! | Field        | Type               | Description                                        |
//! | ------------ | ------------------ | -------------------------------------------------- |
//! | `id`         | `RecordId`         | Opaque, prefixed identifier (`lck_…`).             |
//! | `key`        | `String`           | The caller's account key, e.g. an email. Unique.   |
//! | `attempts`   | `u32`              | Consecutive failed attempts.                       |
//! | `lock_until` | `Option<DateTime>` | Expiry of the current lock, if one was imposed.    |
//! | `created_at` | `DateTime`         | When the record was created.                       |
//! | `updated_at` | `DateTime`         | When the record was last saved.                    |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    id::{generate_prefixed_id, validate_prefixed_id},
    state::LockoutFields,
};

/// A unique, stable identifier for a lockout record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: &str) -> Self {
        RecordId(id.to_string())
    }

    pub fn new_random() -> Self {
        RecordId(generate_prefixed_id("lck"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "lck")
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub id: RecordId,
    pub key: String,
    pub attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LockoutRecord {
    /// A fresh record: zero attempts, no lock.
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new_random(),
            key: key.into(),
            attempts: 0,
            lock_until: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LockoutFields for LockoutRecord {
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
