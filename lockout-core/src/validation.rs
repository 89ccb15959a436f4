use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

/// Identifier pattern accepted for table and column names.
///
/// Names are interpolated into SQL by storage backends, so only plain
/// identifiers of at most 63 characters are allowed.
static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("Invalid identifier regex pattern")
});

/// Validates a table or column name
///
/// # Examples
///
/// ```rust
/// use lockout_core::validation::validate_identifier;
///
/// assert!(validate_identifier("lock_until").is_ok());
/// assert!(validate_identifier("lock until; DROP TABLE users").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}
