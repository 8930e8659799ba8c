//! Local input validation. Nothing here touches the network; a failure
//! re-prompts the same state.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());

/// Normalize a Kazakhstani phone number to `+7XXXXXXXXXX`.
///
/// Accepts `8XXXXXXXXXX`, `7XXXXXXXXXX`, `+7 (XXX) XXX-XX-XX` and the
/// ten-digit local form. Anything else is rejected.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits = NON_DIGITS.replace_all(raw, "");
    let digits = digits.as_ref();
    let national = match digits.len() {
        11 if digits.starts_with('8') || digits.starts_with('7') => &digits[1..],
        10 => digits,
        _ => return Err(ValidationError::MalformedPhone),
    };
    Ok(format!("+7{national}"))
}

/// A national id (IIN) is exactly twelve digits.
pub fn validate_iin(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.len() == 12 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::MalformedIin)
    }
}

/// A name must survive trimming with at least two characters.
pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() >= 2 {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::NameTooShort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_common_kazakh_forms() {
        assert_eq!(normalize_phone("87011234567").unwrap(), "+77011234567");
        assert_eq!(normalize_phone("77011234567").unwrap(), "+77011234567");
        assert_eq!(normalize_phone("+7 (701) 123-45-67").unwrap(), "+77011234567");
        assert_eq!(normalize_phone("7011234567").unwrap(), "+77011234567");
    }

    #[test]
    fn phone_rejects_garbage() {
        assert_eq!(normalize_phone("12345"), Err(ValidationError::MalformedPhone));
        assert_eq!(normalize_phone("hello"), Err(ValidationError::MalformedPhone));
        assert_eq!(
            normalize_phone("871234567890123"),
            Err(ValidationError::MalformedPhone)
        );
    }

    #[test]
    fn iin_is_twelve_digits_exactly() {
        assert_eq!(validate_iin(" 990101350123 ").unwrap(), "990101350123");
        assert_eq!(validate_iin("99010135012"), Err(ValidationError::MalformedIin));
        assert_eq!(validate_iin("99010135012a"), Err(ValidationError::MalformedIin));
    }

    #[test]
    fn name_needs_two_characters_after_trim() {
        assert_eq!(validate_name("  Aigerim  ").unwrap(), "Aigerim");
        assert_eq!(validate_name(" A "), Err(ValidationError::NameTooShort));
        assert_eq!(validate_name("Әл"), Ok("Әл".to_string()));
    }
}
