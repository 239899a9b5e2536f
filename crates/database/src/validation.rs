//! Input validation for participant and streak values.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Identifier must be a positive number.
    NotPositive { field: String, value: i64 },
    /// Not a non-negative whole number.
    InvalidNumber(String),
    /// Number outside the accepted range.
    OutOfRange { field: String, max: u32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::NotPositive { field, value } => {
                write!(f, "{} must be positive (got {})", field, value)
            }
            ValidationError::InvalidNumber(raw) => {
                write!(f, "'{}' is not a non-negative whole number", raw)
            }
            ValidationError::OutOfRange { field, max } => {
                write!(f, "{} must be at most {}", field, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for display names, in characters.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Largest streak an administrator may set (about 27 years).
pub const MAX_STREAK_DAYS: u32 = 10_000;

/// Validate a user id coming from the transport.
pub fn validate_user_id(user_id: i64) -> Result<(), ValidationError> {
    if user_id <= 0 {
        return Err(ValidationError::NotPositive {
            field: "user id".to_string(),
            value: user_id,
        });
    }
    Ok(())
}

/// Validate and normalize a display name.
///
/// Returns the trimmed name.
pub fn validate_display_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Empty("display name".to_string()));
    }

    let length = name.chars().count();
    if length > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "display name".to_string(),
            max: MAX_DISPLAY_NAME_LENGTH,
            actual: length,
        });
    }

    Ok(name.to_string())
}

/// Parse a streak length typed by a user.
pub fn parse_streak_days(raw: &str) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty("streak".to_string()));
    }

    let days: u32 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidNumber(trimmed.to_string()))?;

    validate_streak_days(days)?;
    Ok(days)
}

/// Check a streak length against [`MAX_STREAK_DAYS`].
pub fn validate_streak_days(days: u32) -> Result<(), ValidationError> {
    if days > MAX_STREAK_DAYS {
        return Err(ValidationError::OutOfRange {
            field: "streak".to_string(),
            max: MAX_STREAK_DAYS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(1).is_ok());
        assert!(matches!(
            validate_user_id(0),
            Err(ValidationError::NotPositive { .. })
        ));
        assert!(matches!(
            validate_user_id(-5),
            Err(ValidationError::NotPositive { .. })
        ));
    }

    #[test]
    fn test_validate_display_name() {
        assert_eq!(validate_display_name("  Anna ").unwrap(), "Anna");
        assert!(matches!(
            validate_display_name("   "),
            Err(ValidationError::Empty(_))
        ));

        let long_name = "я".repeat(65);
        assert!(matches!(
            validate_display_name(&long_name),
            Err(ValidationError::TooLong { actual: 65, .. })
        ));
        // Counted in characters, not bytes
        assert!(validate_display_name(&"я".repeat(64)).is_ok());
    }

    #[test]
    fn test_parse_streak_days() {
        assert_eq!(parse_streak_days("0").unwrap(), 0);
        assert_eq!(parse_streak_days(" 100 ").unwrap(), 100);

        assert!(matches!(
            parse_streak_days("-3"),
            Err(ValidationError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_streak_days("ten"),
            Err(ValidationError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_streak_days("2.5"),
            Err(ValidationError::InvalidNumber(_))
        ));
        assert!(matches!(parse_streak_days(""), Err(ValidationError::Empty(_))));
        assert!(matches!(
            parse_streak_days("10001"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidNumber("abc".to_string());
        assert_eq!(err.to_string(), "'abc' is not a non-negative whole number");

        let err = ValidationError::TooLong {
            field: "display name".to_string(),
            max: 64,
            actual: 70,
        };
        assert_eq!(err.to_string(), "display name is too long (70 chars, max 64)");
    }
}
