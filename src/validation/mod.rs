use std::fmt;

pub const PHONE_NUMBER_MAX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Returns the cleaned phone number used for a payment retry.
pub fn validate_phone_number(phone_number: &str) -> Result<String, ValidationError> {
    let phone_number = sanitize_string(phone_number);
    validate_required("phoneNumber", &phone_number)
        .map_err(|_| ValidationError::new("phoneNumber", "Phone number is required"))?;
    validate_max_len("phoneNumber", &phone_number, PHONE_NUMBER_MAX_LEN).map_err(|_| {
        ValidationError::new(
            "phoneNumber",
            format!("Phone number must be at most {} characters", PHONE_NUMBER_MAX_LEN),
        )
    })?;
    Ok(phone_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_phone_number() {
        assert_eq!(validate_phone_number(" 256700123456 ").unwrap(), "256700123456");
        assert_eq!(validate_phone_number("").unwrap_err().field, "phoneNumber");
        assert!(validate_phone_number("\t\n").is_err());
        assert_eq!(
            validate_phone_number("\t\n").unwrap_err().message,
            "Phone number is required"
        );
        assert_eq!(
            validate_phone_number(&"7".repeat(33)).unwrap_err().message,
            "Phone number must be at most 32 characters"
        );
    }
}
