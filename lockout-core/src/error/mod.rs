pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Errors raised while constructing a [`LockoutPolicy`](crate::LockoutPolicy)
/// or a [`FieldMapping`](crate::FieldMapping).
///
/// These are always raised at construction time and never during evaluation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// Offending duration in milliseconds.
    #[error("lock_duration must be positive, got {0}ms")]
    InvalidLockDuration(i64),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Write conflict: {0}")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event bus error: {0}")]
    BusError(String),

    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_error = Error::Config(ConfigError::InvalidMaxAttempts(0));
        assert_eq!(
            config_error.to_string(),
            "Configuration error: max_attempts must be at least 1, got 0"
        );

        let duration_error = Error::Config(ConfigError::InvalidLockDuration(-5));
        assert_eq!(
            duration_error.to_string(),
            "Configuration error: lock_duration must be positive, got -5ms"
        );

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_storage_error_variants() {
        let db_error = StorageError::Database("connection failed".to_string());
        assert_eq!(db_error.to_string(), "Database error: connection failed");

        let conflict = StorageError::Conflict("stale write".to_string());
        assert_eq!(conflict.to_string(), "Write conflict: stale write");
    }

    #[test]
    fn test_event_error_variants() {
        let bus_error = EventError::BusError("dispatcher failed".to_string());
        assert_eq!(bus_error.to_string(), "Event bus error: dispatcher failed");

        let handler_error = EventError::HandlerError("timeout".to_string());
        assert_eq!(handler_error.to_string(), "Event handler error: timeout");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Config(ConfigError::InvalidMaxAttempts(0)).is_config_error());
        assert!(!Error::Config(ConfigError::InvalidMaxAttempts(0)).is_storage_error());
        assert!(Error::Storage(StorageError::NotFound).is_storage_error());
        assert!(Error::Storage(StorageError::NotFound).is_not_found());
        assert!(!Error::Storage(StorageError::Database("x".into())).is_not_found());
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = ConfigError::Parse("bad json".to_string()).into();
        assert!(matches!(error, Error::Config(ConfigError::Parse(_))));

        let error: Error = StorageError::NotFound.into();
        assert!(matches!(error, Error::Storage(StorageError::NotFound)));
    }
}
