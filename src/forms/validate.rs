//! Field validators shared by the credential forms.
//!
//! Each returns the first failing message for its field, or `None`.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Please enter a valid email address";
pub const PASSWORD_REQUIRED: &str = "Password is required";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters";
pub const FIRST_NAME_REQUIRED: &str = "First name is required";
pub const FIRST_NAME_TOO_SHORT: &str = "First name must be at least 2 characters";
pub const LAST_NAME_REQUIRED: &str = "Last name is required";
pub const LAST_NAME_TOO_SHORT: &str = "Last name must be at least 2 characters";
pub const CONFIRM_REQUIRED: &str = "Please confirm your password";
pub const PASSWORDS_DIFFER: &str = "Passwords do not match";

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;

/// Loose address shape check: `local@domain.tld` with no whitespace and a
/// single `@`.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[must_use]
pub fn email(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some(EMAIL_REQUIRED)
    } else if !is_valid_email(value) {
        Some(EMAIL_INVALID)
    } else {
        None
    }
}

/// Sign-in only checks presence. Length rules belong to registration.
#[must_use]
pub fn login_password(value: &str) -> Option<&'static str> {
    value.is_empty().then_some(PASSWORD_REQUIRED)
}

#[must_use]
pub fn new_password(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some(PASSWORD_REQUIRED)
    } else if value.chars().count() < MIN_PASSWORD_CHARS {
        Some(PASSWORD_TOO_SHORT)
    } else {
        None
    }
}

#[must_use]
pub fn first_name(value: &str) -> Option<&'static str> {
    name(value, FIRST_NAME_REQUIRED, FIRST_NAME_TOO_SHORT)
}

#[must_use]
pub fn last_name(value: &str) -> Option<&'static str> {
    name(value, LAST_NAME_REQUIRED, LAST_NAME_TOO_SHORT)
}

fn name(value: &str, required: &'static str, too_short: &'static str) -> Option<&'static str> {
    if value.is_empty() {
        Some(required)
    } else if value.chars().count() < MIN_NAME_CHARS {
        Some(too_short)
    } else {
        None
    }
}

#[must_use]
pub fn confirm_password(password: &str, confirm: &str) -> Option<&'static str> {
    if confirm.is_empty() {
        Some(CONFIRM_REQUIRED)
    } else if confirm != password {
        Some(PASSWORDS_DIFFER)
    } else {
        None
    }
}
