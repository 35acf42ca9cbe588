//! Validation helper functions for configuration types.

use crate::core::errors::{BadcodeError, Result};
use crate::lang::registry::normalize_language_key;

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(BadcodeError::Validation {
            message: format!("{} must be greater than 0", field),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Validate that an f64 value is in the unit range [0.0, 1.0].
pub fn validate_unit_range(value: f64, field: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(BadcodeError::Validation {
            message: format!("{} must be between 0.0 and 1.0", field),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Validate that a usize value is within a bounded range (inclusive).
pub fn validate_bounded_usize(value: usize, min: usize, max: usize, field: &str) -> Result<()> {
    if value < min || value > max {
        return Err(BadcodeError::Validation {
            message: format!("{} must be between {} and {}", field, min, max),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Validate that a string setting is not blank.
pub fn validate_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BadcodeError::Validation {
            message: format!("{} must not be empty", field),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Validate that every entry names a registered language.
pub fn validate_language_keys(languages: &[String], field: &str) -> Result<()> {
    if let Some(unknown) = languages
        .iter()
        .find(|language| normalize_language_key(language).is_none())
    {
        return Err(BadcodeError::Validation {
            message: format!("{} contains unknown language '{}'", field, unknown),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}
