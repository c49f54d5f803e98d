//! Client-side input checks.
//!
//! Everything here runs before a request is built. A `ValidationError` is
//! resolved locally and never reaches the gateway.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::BirthData;

/// Earliest birth year the service accepts
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Minimum password length accepted by the service
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Nickname length bounds, counted in characters after trimming
pub const MIN_NICKNAME_LENGTH: usize = 2;
pub const MAX_NICKNAME_LENGTH: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Nickname must be 2-20 characters")]
    NicknameLength,

    #[error("Year must be between 1900 and {max}")]
    YearOutOfRange { max: i32 },

    #[error("Month must be between 1 and 12")]
    MonthOutOfRange,

    #[error("Day must be between 1 and 31")]
    DayOutOfRange,

    #[error("Hour must be between 0 and 23")]
    HourOutOfRange,

    #[error("{0} is not a real calendar date")]
    NoSuchDate(String),

    #[error("Please log in first")]
    LoginRequired,
}

/// Check that an email looks like `local@domain.tld` with no whitespace
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::Missing("Email"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    // Domain needs a dot with something on both sides of at least one of them
    let has_dotted_part = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    if has_dotted_part {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Missing("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing("Nickname"));
    }
    let len = trimmed.chars().count();
    if !(MIN_NICKNAME_LENGTH..=MAX_NICKNAME_LENGTH).contains(&len) {
        return Err(ValidationError::NicknameLength);
    }
    Ok(())
}

/// Validate a birth date against the service's accepted ranges.
/// `current_year` bounds the year from above.
pub fn validate_birth(birth: &BirthData, current_year: i32) -> Result<(), ValidationError> {
    if !(MIN_BIRTH_YEAR..=current_year).contains(&birth.year) {
        return Err(ValidationError::YearOutOfRange { max: current_year });
    }
    if !(1..=12).contains(&birth.month) {
        return Err(ValidationError::MonthOutOfRange);
    }
    if !(1..=31).contains(&birth.day) {
        return Err(ValidationError::DayOutOfRange);
    }
    if birth.hour > 23 {
        return Err(ValidationError::HourOutOfRange);
    }
    if NaiveDate::from_ymd_opt(birth.year, birth.month, birth.day).is_none() {
        return Err(ValidationError::NoSuchDate(format!(
            "{}-{:02}-{:02}",
            birth.year, birth.month, birth.day
        )));
    }
    Ok(())
}

/// Normalize an email the way the service stores it
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
