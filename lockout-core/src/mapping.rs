//! Storage naming for lockout fields
//!
//! Hosts that want the lockout data under their own names (for example a
//! `login_guards` table with `failed_logins` and `locked_until` columns)
//! describe that layout with a [`FieldMapping`]. Storage backends read the
//! names from here and never hard-code them.

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, validation::validate_identifier};

pub const DEFAULT_TABLE: &str = "lockout_records";
pub const DEFAULT_ATTEMPTS_COLUMN: &str = "attempts";
pub const DEFAULT_LOCK_UNTIL_COLUMN: &str = "lock_until";

/// Columns storage backends keep next to the lockout fields. Mapped column
/// names may not reuse them.
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "lockout_key", "created_at", "updated_at"];

/// Validated table and column names used by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    table: String,
    attempts: String,
    lock_until: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            attempts: DEFAULT_ATTEMPTS_COLUMN.to_string(),
            lock_until: DEFAULT_LOCK_UNTIL_COLUMN.to_string(),
        }
    }
}

impl FieldMapping {
    pub fn new(
        table: impl Into<String>,
        attempts: impl Into<String>,
        lock_until: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let mapping = Self {
            table: table.into(),
            attempts: attempts.into(),
            lock_until: lock_until.into(),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attempts(&self) -> &str {
        &self.attempts
    }

    pub fn lock_until(&self) -> &str {
        &self.lock_until
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.attempts)?;
        validate_identifier(&self.lock_until)?;

        for column in [&self.attempts, &self.lock_until] {
            if RESERVED_COLUMNS
                .iter()
                .any(|reserved| column.eq_ignore_ascii_case(reserved))
            {
                return Err(ConfigError::DuplicateColumn(column.clone()));
            }
        }

        if self.attempts.eq_ignore_ascii_case(&self.lock_until) {
            return Err(ConfigError::DuplicateColumn(self.lock_until.clone()));
        }

        Ok(())
    }
}

/// Deserialization goes through [`FieldMapping::new`] so names read from a
/// config file are validated like any other.
impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(default, deny_unknown_fields)]
        struct Raw {
            table: String,
            attempts: String,
            lock_until: String,
        }

        impl Default for Raw {
            fn default() -> Self {
                Self {
                    table: DEFAULT_TABLE.to_string(),
                    attempts: DEFAULT_ATTEMPTS_COLUMN.to_string(),
                    lock_until: DEFAULT_LOCK_UNTIL_COLUMN.to_string(),
                }
            }
        }

        let raw = Raw::deserialize(deserializer)?;
        FieldMapping::new(raw.table, raw.attempts, raw.lock_until).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let mapping = FieldMapping::default();
        assert_eq!(mapping.table(), "lockout_records");
        assert_eq!(mapping.attempts(), "attempts");
        assert_eq!(mapping.lock_until(), "lock_until");
    }

    #[test]
    fn test_custom_mapping() {
        let mapping = FieldMapping::new("users", "failed_logins", "locked_until").unwrap();
        assert_eq!(mapping.table(), "users");
        assert_eq!(mapping.attempts(), "failed_logins");
        assert_eq!(mapping.lock_until(), "locked_until");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert_eq!(
            FieldMapping::new("users; DROP TABLE x", "a", "b").unwrap_err(),
            ConfigError::InvalidIdentifier("users; DROP TABLE x".to_string())
        );
        assert!(FieldMapping::new("users", "", "b").is_err());
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        assert_eq!(
            FieldMapping::new("users", "attempts", "Attempts").unwrap_err(),
            ConfigError::DuplicateColumn("Attempts".to_string())
        );
    }

    #[test]
    fn test_rejects_reserved_columns() {
        assert_eq!(
            FieldMapping::new("lockout_records", "created_at", "lock_until").unwrap_err(),
            ConfigError::DuplicateColumn("created_at".to_string())
        );
        assert_eq!(
            FieldMapping::new("lockout_records", "attempts", "ID").unwrap_err(),
            ConfigError::DuplicateColumn("ID".to_string())
        );
        assert!(FieldMapping::new("lockout_records", "lockout_key", "lock_until").is_err());
        assert!(FieldMapping::new("lockout_records", "attempts", "updated_at").is_err());
    }

    #[test]
    fn test_accepts_keyword_names() {
        let mapping = FieldMapping::new("order", "group", "limit").unwrap();
        assert_eq!(mapping.table(), "order");
    }

    #[test]
    fn test_deserialize_validates() {
        let mapping: FieldMapping =
            serde_json::from_str(r#"{"table": "users", "attempts": "failed_logins"}"#).unwrap();
        assert_eq!(mapping.table(), "users");
        assert_eq!(mapping.attempts(), "failed_logins");
        assert_eq!(mapping.lock_until(), "lock_until");

        let result: Result<FieldMapping, _> = serde_json::from_str(r#"{"table": "bad name"}"#);
        assert!(result.is_err());
    }
}
