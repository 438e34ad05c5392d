//! Ready-made text rules for common fields.

use super::{FieldRule, FieldType};

fn text(min: usize, max: usize) -> FieldRule {
    FieldRule::new(FieldType::String).length(min, max)
}

/// 1 to 64 characters.
#[must_use]
pub fn short_text() -> FieldRule {
    text(1, 64)
}

/// 4 to 255 characters.
#[must_use]
pub fn long_text() -> FieldRule {
    text(4, 255)
}

/// 4 to 255 characters.
#[must_use]
pub fn password() -> FieldRule {
    text(4, 255)
}

/// 2 to 32 characters.
#[must_use]
pub fn username() -> FieldRule {
    text(2, 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{JsonSchemaValidator, Schema, Validator};
    use serde_json::json;

    #[test]
    fn test_presets_are_optional_until_required() {
        let schema = Schema::new().property("user", username());
        assert!(JsonSchemaValidator.validate(&json!({}), &schema).valid);

        let schema = Schema::new().property("user", username().required());
        assert!(!JsonSchemaValidator.validate(&json!({}), &schema).valid);
    }

    #[test]
    fn test_username_bounds() {
        let schema = Schema::new().property("user", username());
        assert!(!JsonSchemaValidator.validate(&json!({"user": "a"}), &schema).valid);
        assert!(JsonSchemaValidator.validate(&json!({"user": "ab"}), &schema).valid);
        assert!(!JsonSchemaValidator.validate(&json!({"user": "a".repeat(33)}), &schema).valid);
    }
}
