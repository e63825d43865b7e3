//! Field validators used with `#[validate(custom(function = ...))]`.

use chrono::NaiveDate;
use patterns::{is_phone_like, is_slug_like};
use validator::ValidationError;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates a tenant slug: 3-63 chars of lowercase letters, digits and inner hyphens.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_slug_like(slug) {
        Ok(())
    } else {
        Err(error(
            "slug_format",
            "Slug must be 3-63 lowercase letters, digits or hyphens, not starting or ending with a hyphen",
        ))
    }
}

/// Validates an E.164-ish phone number: optional `+`, then 7 to 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_phone_like(phone) {
        Ok(())
    } else {
        Err(error("phone_format", "Phone must be 7-15 digits with an optional leading +"))
    }
}

/// Validates that a date of birth lies in the past and within 120 years.
pub fn validate_date_of_birth(date: &NaiveDate) -> Result<(), ValidationError> {
    let today = chrono::Utc::now().date_naive();
    if *date >= today {
        return Err(error("dob_future", "Date of birth must be in the past"));
    }
    if today.years_since(*date).unwrap_or(0) > 120 {
        return Err(error("dob_range", "Date of birth is too far in the past"));
    }
    Ok(())
}

mod patterns {
    pub fn is_slug_like(s: &str) -> bool {
        (3..=63).contains(&s.len())
            && s
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
            && !s.starts_with('-')
            && !s.ends_with('-')
    }

    pub fn is_phone_like(s: &str) -> bool {
        let digits = s.strip_prefix('+').unwrap_or(s);
        (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_slug() {
        assert!(validate_slug("iron-gym").is_ok());
        assert!(validate_slug("gym42").is_ok());
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug("Iron-Gym").is_err());
        assert!(validate_slug("-gym").is_err());
        assert!(validate_slug("gym-").is_err());
        assert!(validate_slug("gym_one").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+966501234567").is_ok());
        assert!(validate_phone("0501234567").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("+96650-123").is_err());
    }

    #[test]
    fn test_date_of_birth() {
        let today = chrono::Utc::now().date_naive();
        assert!(validate_date_of_birth(&(today - Duration::days(365 * 30))).is_ok());
        assert!(validate_date_of_birth(&today).is_err());
        assert!(validate_date_of_birth(&(today - Duration::days(365 * 130))).is_err());
    }

    #[test]
    fn test_error_carries_message() {
        let err = validate_slug("X").unwrap_err();
        assert_eq!(err.code, "slug_format");
        assert!(err.message.is_some());
    }
}
