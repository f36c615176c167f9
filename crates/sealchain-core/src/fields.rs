use crate::error::SealError;

/// Reject `value` when it exceeds `max` characters. Exactly-at-limit values
/// pass. Overflow is an error, never a silent truncation.
pub fn require_max_chars(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), SealError> {
    let got = value.chars().count();
    if got > max {
        return Err(SealError::FieldTooLong { field, max, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        MAX_AUDIT_OPERATION_CHARS, MAX_AUDIT_REASON_CHARS, MAX_CONFIG_KEY_CHARS,
        MAX_CONFIG_TYPE_CHARS, MAX_CONTENT_CATEGORY_CHARS, MAX_CONTENT_TYPE_CHARS,
        MAX_KEYWORDS_CHARS, MAX_OWNER_NAME_CHARS, MAX_SEARCHABLE_CONTENT_CHARS,
    };

    #[test]
    fn at_limit_passes_over_limit_fails() {
        let caps = [
            ("owner_name", MAX_OWNER_NAME_CHARS),
            ("manual_keywords", MAX_KEYWORDS_CHARS),
            ("auto_keywords", MAX_KEYWORDS_CHARS),
            ("searchable_content", MAX_SEARCHABLE_CONTENT_CHARS),
            ("content_category", MAX_CONTENT_CATEGORY_CHARS),
            ("content_type", MAX_CONTENT_TYPE_CHARS),
            ("operation", MAX_AUDIT_OPERATION_CHARS),
            ("change_reason", MAX_AUDIT_REASON_CHARS),
            ("config_key", MAX_CONFIG_KEY_CHARS),
            ("config_type", MAX_CONFIG_TYPE_CHARS),
        ];
        for (field, max) in caps {
            assert!(require_max_chars(field, &"x".repeat(max), max).is_ok());
            let err = require_max_chars(field, &"x".repeat(max + 1), max).unwrap_err();
            assert!(matches!(err, SealError::FieldTooLong { .. }));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        // Four multibyte characters, eight bytes.
        let value = "éééé";
        assert_eq!(value.len(), 8);
        assert!(require_max_chars("owner_name", value, 4).is_ok());
        assert!(require_max_chars("owner_name", value, 3).is_err());
    }
}
