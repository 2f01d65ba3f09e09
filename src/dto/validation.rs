//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name accepted on join, counted in characters after trimming.
pub const MAX_DISPLAY_NAME_CHARS: usize = 15;

/// Validates that a display name has 1 to [`MAX_DISPLAY_NAME_CHARS`] characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("ada")              // Ok
/// validate_display_name("   ")              // Err - blank
/// validate_display_name("a very long name") // Err - 16 characters
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Name must not be empty".into());
        return Err(err);
    }

    if length > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Name must be at most {MAX_DISPLAY_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a free-text field is not only whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
