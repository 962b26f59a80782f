//! Input checks shared by registration and password reset.

use once_cell::sync::Lazy;
use regex::Regex;

use super::errors::AuthError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email regex"));

pub const WEAK_PASSWORD_MESSAGE: &str = "Password must be at least 8 characters long and contain a combination of letters, numbers, and special characters";

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with upper, lower, digit and a non-alphanumeric character.
pub fn is_valid_password(password: &str) -> bool {
    if password.chars().count() < 8 {
        return false;
    }
    let mut upper = false;
    let mut lower = false;
    let mut digit = false;
    let mut special = false;
    for c in password.chars() {
        if c.is_uppercase() {
            upper = true;
        } else if c.is_lowercase() {
            lower = true;
        } else if c.is_numeric() {
            digit = true;
        } else if !c.is_alphanumeric() {
            special = true;
        }
    }
    upper && lower && digit && special
}

/// Collect named fields that are absent or blank into one `Validation` error.
pub fn require_fields<'a>(fields: &[(&str, &'a Option<String>)]) -> Result<Vec<&'a str>, AuthError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AuthError::Validation(format!("Missing fields: {}", missing.join(", "))));
    }
    Ok(fields.iter().map(|&(_, v)| v.as_deref().unwrap_or_default()).collect())
}

/// Strength and confirmation checks for a new password.
pub fn check_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if !is_valid_password(password) {
        return Err(AuthError::Validation(WEAK_PASSWORD_MESSAGE.into()));
    }
    if password != confirm {
        return Err(AuthError::Validation("Password field must match with confirm password field".into()));
    }
    Ok(())
}
