//! Input validation and normalisation.
//!
//! All identifiers are validated and NFKC-normalised before they reach the
//! credential store, so lookups and uniqueness checks see one canonical form.

use crate::config::PasswordPolicy;
use crate::secrets::Password;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty.
    #[error("{field} is required")]
    Empty {
        /// Field name.
        field: &'static str,
    },

    /// Input exceeds maximum allowed length.
    #[error("{field} exceeds maximum length ({max} characters, got {actual})")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Disallowed characters in input.
    #[error("{field} may only contain letters and digits")]
    DisallowedChars {
        /// Field name.
        field: &'static str,
    },

    /// Password does not meet the configured policy.
    #[error("Password must be at least {min_length} characters and contain at least {min_lowercase} lowercase letter(s) and {min_digits} digit(s)")]
    WeakPassword {
        /// Required length.
        min_length: usize,
        /// Required lowercase letters.
        min_lowercase: usize,
        /// Required digits.
        min_digits: usize,
    },

    /// Identifier is not a positive integer.
    #[error("{field} must be a positive integer")]
    InvalidId {
        /// Field name.
        field: &'static str,
    },
}

/// Size limits per input type, in characters.
pub mod limits {
    /// Maximum username length.
    pub const MAX_USERNAME_LENGTH: usize = 20;

    /// Maximum role name length.
    pub const MAX_ROLE_NAME_LENGTH: usize = 50;

    /// Maximum first/last name length.
    pub const MAX_PERSON_NAME_LENGTH: usize = 50;
}

/// Strip control characters, trim, and NFKC-normalise an identifier.
#[must_use]
pub fn normalize_identifier(input: &str) -> String {
    let sanitized: String = input.chars().filter(|c| !c.is_control()).collect();
    sanitized.trim().nfkc().collect()
}

/// Validate and normalise a username.
///
/// # Errors
///
/// Returns an error if the name is empty, longer than
/// [`limits::MAX_USERNAME_LENGTH`], or not alphanumeric.
pub fn validate_username(input: &str) -> Result<String, ValidationError> {
    const FIELD: &str = "username";
    let normalized = normalize_identifier(input);
    check_length(FIELD, &normalized, limits::MAX_USERNAME_LENGTH)?;
    if !normalized.chars().all(char::is_alphanumeric) {
        return Err(ValidationError::DisallowedChars { field: FIELD });
    }
    Ok(normalized)
}

/// Validate and normalise a role name.
///
/// # Errors
///
/// Returns an error if the name is empty or longer than
/// [`limits::MAX_ROLE_NAME_LENGTH`].
pub fn validate_role_name(input: &str) -> Result<String, ValidationError> {
    let normalized = normalize_identifier(input);
    check_length("name", &normalized, limits::MAX_ROLE_NAME_LENGTH)?;
    Ok(normalized)
}

/// Validate an optional first or last name.
///
/// # Errors
///
/// Returns `TooLong` past [`limits::MAX_PERSON_NAME_LENGTH`].
pub fn validate_person_name(
    field: &'static str,
    input: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    let Some(raw) = input else {
        return Ok(None);
    };
    let normalized = normalize_identifier(raw);
    if normalized.is_empty() {
        return Ok(None);
    }
    let actual = normalized.chars().count();
    if actual > limits::MAX_PERSON_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: limits::MAX_PERSON_NAME_LENGTH,
            actual,
        });
    }
    Ok(Some(normalized))
}

/// Check a password against the strength policy.
///
/// # Errors
///
/// Returns `WeakPassword` describing the policy if any minimum is not met.
pub fn validate_password(
    password: &Password,
    policy: &PasswordPolicy,
) -> Result<(), ValidationError> {
    let plaintext = password.expose();
    let lowercase = plaintext.chars().filter(char::is_ascii_lowercase).count();
    let digits = plaintext.chars().filter(char::is_ascii_digit).count();

    if password.char_count() < policy.min_length
        || lowercase < policy.min_lowercase
        || digits < policy.min_digits
    {
        return Err(ValidationError::WeakPassword {
            min_length: policy.min_length,
            min_lowercase: policy.min_lowercase,
            min_digits: policy.min_digits,
        });
    }
    Ok(())
}

/// Parse a path or body identifier that must be an integer `>= 1`.
///
/// # Errors
///
/// Returns `InvalidId` for zero, negative, or non-numeric input.
pub fn parse_id(field: &'static str, raw: &str) -> Result<u64, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ValidationError::InvalidId { field }),
    }
}

/// `validator` hook: reject usernames with non-alphanumeric characters.
///
/// # Errors
///
/// Returns a `validator` error with code `alphanumeric`.
pub fn alphanumeric(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().all(char::is_alphanumeric) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("alphanumeric");
        err.message = Some("may only contain letters and digits".into());
        Err(err)
    }
}

/// `validator` hook: reject blank strings.
///
/// # Errors
///
/// Returns a `validator` error with code `blank`.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}
