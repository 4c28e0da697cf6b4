//! Field checks shared by several handlers.

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn username(value: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::validation("username", "Username must be 3-32 characters."));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(ApiError::validation(
            "username",
            "Username may only contain letters, digits and . _ -",
        ));
    }
    Ok(())
}

pub fn password(field: &str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            field,
            format!("Password must be at least {} characters.", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Loose shape check: one `@`, something before it, a dot in the domain.
pub fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::validation(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        ));
    }
    Ok(())
}
