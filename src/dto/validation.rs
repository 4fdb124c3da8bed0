//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted user or device identifier.
const MAX_IDENTIFIER_LEN: usize = 128;

/// Validates a user or device identifier used to build coordination store keys.
///
/// Identifiers must be 1 to 128 printable characters without whitespace and without
/// `:`, the key segment separator.
///
/// # Examples
///
/// ```ignore
/// validate_identifier("phone-3f2a") // Ok
/// validate_identifier("")           // Err - empty
/// validate_identifier("a:b")        // Err - separator
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.chars().count() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} characters (got {})",
                id.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if id
        .chars()
        .any(|c| c == ':' || c.is_whitespace() || c.is_control())
    {
        let mut err = ValidationError::new("identifier_format");
        err.message =
            Some("Identifier must not contain ':', whitespace or control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("phone-1").is_ok());
        assert!(validate_identifier("3f2a9c1e-0b7d-4d1e-9d8a-1c2b3a4d5e6f").is_ok());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid_length() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_identifier_invalid_format() {
        assert!(validate_identifier("user:1").is_err()); // separator
        assert!(validate_identifier("my phone").is_err()); // space
        assert!(validate_identifier("tab\tlet").is_err()); // control
    }
}
