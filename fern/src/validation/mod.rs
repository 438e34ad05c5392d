//! Request validation.
//!
//! A [`Validator`] checks a JSON value against a [`Schema`]; [`SchemaCheck`]
//! turns that into a `use_body` callback that fails the run with
//! `400 Bad request` on the first violation.

mod presets;
mod rules;

pub use presets::{long_text, password, short_text, username};
pub use rules::{FieldRule, FieldType, JsonSchemaValidator, Schema};

use crate::context::{FieldMap, FieldSource, RequestContext};
use crate::core::{Method, Outcome, StageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of a validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the value conforms.
    pub valid: bool,
    /// Violations, in schema order.
    pub errors: Vec<String>,
}

impl Validation {
    /// A passing validation.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A validation from a list of violations.
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// The validation boundary.
pub trait Validator: Send + Sync {
    /// Validates `value` against `schema`.
    fn validate(&self, value: &Value, schema: &Schema) -> Validation;
}

/// What a failed check hands to its failure hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Always `validation`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The first violation.
    pub message: String,
}

type FailureHook = Arc<dyn Fn(&ValidationFailure) -> StageResult + Send + Sync>;

/// A schema check usable as a `use_*` callback.
///
/// Validates the raw path parameters on `GET` routes and the raw body
/// otherwise.
pub struct SchemaCheck {
    schema: Schema,
    validator: Arc<dyn Validator>,
    on_failure: Option<FailureHook>,
}

impl SchemaCheck {
    /// Creates a check using [`JsonSchemaValidator`].
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            validator: Arc::new(JsonSchemaValidator),
            on_failure: None,
        }
    }

    /// Uses another validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replaces the default `400 Bad request` result.
    #[must_use]
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValidationFailure) -> StageResult + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }

    /// Runs the check against a context.
    #[must_use]
    pub fn check(&self, ctx: &RequestContext) -> StageResult {
        let source = if ctx.method() == Some(Method::Get) {
            FieldSource::Params
        } else {
            FieldSource::Body
        };
        let value = Value::Object(ctx.request().source(source).cloned().unwrap_or_default());

        let validation = self.validator.validate(&value, &self.schema);
        let Some(first) = validation.errors.into_iter().next() else {
            return StageResult::Continue;
        };

        debug!(source = %source, error = %first, "validation failed");
        let failure = ValidationFailure {
            kind: "validation".to_string(),
            message: first,
        };
        match &self.on_failure {
            Some(hook) => hook(&failure),
            None => Outcome::new(400, "Bad request")
                .with_cause(failure.message)
                .into(),
        }
    }

    /// Converts the check into a `use_*` callback.
    pub fn into_callback(
        self,
    ) -> impl Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static {
        move |_, ctx| self.check(ctx)
    }
}

impl std::fmt::Debug for SchemaCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCheck")
            .field("schema", &self.schema)
            .field("on_failure", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}

/// Shorthand for `SchemaCheck::new(schema).into_callback()`.
pub fn schema_validator(
    schema: Schema,
) -> impl Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static {
    SchemaCheck::new(schema).into_callback()
}
