//! Input validation for the command-line scripts.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    })
}

/// Validate an e-mail address.
///
/// # Example
/// ```
/// use subkeeper::validation::validate_email;
///
/// assert!(validate_email("ada@example.com", "email").is_ok());
/// assert!(validate_email("not-an-email", "email").is_err());
/// ```
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    if email_regex().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid e-mail address".to_string(),
        })
    }
}

/// Validate that a string is not empty or whitespace only.
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validate that a count is within `min..=max`.
pub fn validate_range(value: u32, min: u32, max: u32, field_name: &str) -> ValidationResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be between {min} and {max}, got {value}"),
        })
    }
}
