//! Object schemas and the default JSON Schema validator.

use super::{Validation, Validator};
use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// JSON type a property must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A string.
    String,
    /// Any number.
    Number,
    /// An integer.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// An object.
    Object,
    /// An array.
    Array,
}

impl FieldType {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Constraints on one property.
#[derive(Debug, Clone)]
pub struct FieldRule {
    kind: FieldType,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    required: bool,
}

impl FieldRule {
    /// An optional property of the given type.
    #[must_use]
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            min_length: None,
            max_length: None,
            pattern: None,
            required: false,
        }
    }

    /// Sets the string length bounds (in characters).
    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Requires strings to match `pattern`.
    #[must_use]
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Marks the property as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns true if the property must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the property's JSON type.
    #[must_use]
    pub fn kind(&self) -> FieldType {
        self.kind
    }

    fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.kind.as_str()));
        if let Some(min) = self.min_length {
            out.insert("minLength".into(), json!(min));
        }
        if let Some(max) = self.max_length {
            out.insert("maxLength".into(), json!(max));
        }
        if let Some(pattern) = &self.pattern {
            out.insert("pattern".into(), json!(pattern.as_str()));
        }
        Value::Object(out)
    }
}

/// An object schema: named properties, no extras allowed.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    properties: BTreeMap<String, FieldRule>,
}

impl Schema {
    /// An empty schema; only `{}` conforms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.properties.insert(name.into(), rule);
        self
    }

    /// Returns the rule for `name`.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.properties.get(name)
    }

    /// Iterates properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the schema as a JSON Schema document.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, rule)| (name.clone(), rule.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .properties()
            .filter(|(_, rule)| rule.is_required())
            .map(|(name, _)| name)
            .collect();

        let mut document = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        if !required.is_empty() {
            document["required"] = json!(required);
        }
        document
    }
}

/// Validates with the `jsonschema` crate.
///
/// Messages name the offending property and never echo its value, so they
/// are safe to hand back to clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl Validator for JsonSchemaValidator {
    fn validate(&self, value: &Value, schema: &Schema) -> Validation {
        let document = schema.to_json_schema();
        let validator = match jsonschema::validator_for(&document) {
            Ok(validator) => validator,
            Err(e) => return Validation::from_errors(vec![format!("invalid schema: {e}")]),
        };

        let errors = validator
            .iter_errors(value)
            .map(|error| describe(&error, schema))
            .collect();
        Validation::from_errors(errors)
    }
}

fn describe(error: &ValidationError<'_>, schema: &Schema) -> String {
    let path = error
        .instance_path
        .to_string()
        .trim_start_matches('/')
        .replace('/', ".");
    let subject = |rest: String| {
        if path.is_empty() {
            rest
        } else {
            format!("{path} {rest}")
        }
    };

    match &error.kind {
        ValidationErrorKind::MinLength { limit, .. } => {
            subject(format!("does not meet minimum length of {limit}"))
        }
        ValidationErrorKind::MaxLength { limit, .. } => {
            subject(format!("does not meet maximum length of {limit}"))
        }
        ValidationErrorKind::Pattern { pattern, .. } => {
            subject(format!("does not match pattern \"{pattern}\""))
        }
        ValidationErrorKind::Required { property, .. } => {
            let name = property
                .as_str()
                .map_or_else(|| property.to_string(), str::to_string);
            format!("{name} is required")
        }
        ValidationErrorKind::AdditionalProperties { unexpected, .. } => subject(format!(
            "is not allowed to have the additional property \"{}\"",
            unexpected.join("\", \"")
        )),
        ValidationErrorKind::Type { .. } => {
            let expected = schema
                .rule(&path)
                .map_or("object", |rule| rule.kind().as_str());
            subject(format!("is not of a type(s) {expected}"))
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::new()
            .property("name", FieldRule::new(FieldType::String).length(2, 4).required())
            .property("age", FieldRule::new(FieldType::Integer))
    }

    #[test]
    fn test_json_schema_document() {
        assert_eq!(
            schema().to_json_schema(),
            json!({
                "type": "object",
                "properties": {
                    "age": {"type": "integer"},
                    "name": {"type": "string", "minLength": 2, "maxLength": 4},
                },
                "required": ["name"],
                "additionalProperties": false,
            })
        );
    }

    #[test]
    fn test_conforming_object() {
        let v = JsonSchemaValidator.validate(&json!({"name": "bob"}), &schema());
        assert!(v.valid);
        assert!(v.errors.is_empty());
    }

    #[test]
    fn test_missing_required() {
        let v = JsonSchemaValidator.validate(&json!({"age": 3}), &schema());
        assert_eq!(v.errors, vec!["name is required".to_string()]);
    }

    #[test]
    fn test_length_and_type() {
        let v = JsonSchemaValidator.validate(&json!({"name": "robert", "age": "x"}), &schema());
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 2);
        assert!(v.errors.contains(&"age is not of a type(s) integer".to_string()));
        assert!(v.errors.contains(&"name does not meet maximum length of 4".to_string()));
    }

    #[test]
    fn test_messages_do_not_echo_values() {
        let v = JsonSchemaValidator.validate(&json!({"name": "hunter2"}), &schema());
        assert!(v.errors.iter().all(|e| !e.contains("hunter2")));
    }

    #[test]
    fn test_additional_property_rejected() {
        let v = JsonSchemaValidator.validate(&json!({"name": "bob", "admin": true}), &schema());
        assert_eq!(
            v.errors,
            vec!["is not allowed to have the additional property \"admin\"".to_string()]
        );
    }

    #[test]
    fn test_pattern() {
        let schema = Schema::new().property(
            "code",
            FieldRule::new(FieldType::String).pattern(Regex::new("^[0-9]+$").unwrap()),
        );
        assert!(JsonSchemaValidator.validate(&json!({"code": "123"}), &schema).valid);

        let v = JsonSchemaValidator.validate(&json!({"code": "12a"}), &schema);
        assert_eq!(v.errors, vec!["code does not match pattern \"^[0-9]+$\"".to_string()]);
    }

    #[test]
    fn test_non_object() {
        let v = JsonSchemaValidator.validate(&json!([1]), &Schema::new());
        assert!(!v.valid);
        assert_eq!(v.errors[0], "is not of a type(s) object");
    }
}
