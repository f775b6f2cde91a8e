//! Input validation for writes
//!
//! Every repository write runs its user-supplied fields through these
//! checks before touching the database. Violations surface as
//! `DbError::ValidationError` with a message naming the field.

use crate::error::{DbError, DbResult};

/// Maximum length of names and titles, in characters
pub const MAX_NAME_LEN: usize = 120;

/// Maximum length of descriptions and notes, in characters
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Maximum length of project role names, in characters
pub const MAX_ROLE_NAME_LEN: usize = 40;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Trim a required name-like field and check its length.
///
/// Returns the trimmed value.
pub fn required_text(field: &str, value: &str, max: usize) -> DbResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DbError::invalid(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max {
        return Err(DbError::invalid(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional free-text field; blank values become `None`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> DbResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(DbError::invalid(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn name(field: &str, value: &str) -> DbResult<String> {
    required_text(field, value, MAX_NAME_LEN)
}

pub fn description(value: Option<&str>) -> DbResult<Option<String>> {
    optional_text("description", value, MAX_DESCRIPTION_LEN)
}

/// Normalize and validate an email address.
///
/// Requires exactly one `@`, a non-empty local part and a domain
/// containing a dot that doesn't start or end with one. The result is
/// lowercased.
pub fn email(value: &str) -> DbResult<String> {
    let normalized = value.trim().to_lowercase();
    let invalid = || DbError::invalid(format!("invalid email '{}'", value.trim()));

    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || normalized.chars().any(char::is_whitespace)
        || normalized.len() > 254
    {
        return Err(invalid());
    }

    Ok(normalized)
}

pub fn password(value: &str) -> DbResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(DbError::invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn role_name(value: &str) -> DbResult<String> {
    required_text("role name", value, MAX_ROLE_NAME_LEN)
}
