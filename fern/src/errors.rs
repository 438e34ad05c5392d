//! Error types for the fern framework.
//!
//! Every failure a run can hit maps onto exactly one [`Outcome`] before it
//! reaches the terminal emitter; [`FernError::to_outcome`] is that mapping.

use crate::core::{Outcome, RouteKey};
use crate::context::FieldSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Message used for results that carry no usable value.
pub const FUNCTION_FAILED: &str = "Function failed";

/// Message used for routes registered without any stage.
pub const INVALID_IMPLEMENTATION: &str = "ServerError: Invalid implementation";

/// The main error type for fern operations.
#[derive(Debug, Error)]
pub enum FernError {
    /// The raw request did not carry the source a mapping stage needs.
    #[error("Invalid request: missing {0}")]
    InvalidRequest(FieldSource),

    /// Required fields were missing or failed validation.
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// A data-source query returned nothing.
    #[error("{message}")]
    NotFound {
        /// Status code chosen by the caller.
        code: u16,
        /// Message for the boundary.
        message: String,
    },

    /// A pipeline or stage was wired incorrectly.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The data source failed.
    #[error("{0}")]
    DataSource(#[from] DataSourceError),

    /// A pending stage result did not resolve in time.
    #[error("Stage '{stage}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The stage that was suspended.
        stage: String,
        /// The configured bound.
        timeout_ms: u64,
    },

    /// The run was cancelled before it finished.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A stage panicked.
    #[error("Stage '{stage}' panicked: {message}")]
    Panicked {
        /// The stage that panicked.
        stage: String,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FernError {
    /// Returns the status code the boundary sees for this error.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::BadRequest(_) => 403,
            Self::NotFound { code, .. } => *code,
            Self::Timeout { .. } => 504,
            Self::Cancelled(_) => 503,
            Self::Configuration(_)
            | Self::DataSource(_)
            | Self::Panicked { .. }
            | Self::Internal(_)
            | Self::Serialization(_) => 500,
        }
    }

    /// Converts the error into the failure outcome delivered to the boundary.
    ///
    /// Errors raised from inside a stage become a generic `Function failed`
    /// outcome with the error attached as the cause.
    #[must_use]
    pub fn to_outcome(&self, prefix: &str) -> Outcome {
        match self {
            Self::InvalidRequest(_) => Outcome::invalid_request(),
            Self::BadRequest(_) => Outcome::bad_request(),
            Self::NotFound { code, message } => Outcome::new(*code, message.clone()),
            Self::Timeout { .. } => Outcome::new(504, "Stage timed out").with_cause(self.to_string()),
            Self::Cancelled(reason) => Outcome::new(503, "Run cancelled").with_cause(reason.clone()),
            _ => Outcome::new(500, format!("{prefix}: {FUNCTION_FAILED}"))
                .with_cause(self.to_string()),
        }
    }
}

/// Error raised when a pipeline is wired in a way that can never succeed.
///
/// These are not retried and are not softened into a regular outcome by the
/// stage that hits them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The route has no stages.
    #[error("Route '{0}' has no stages")]
    EmptyPipeline(RouteKey),

    /// A consuming stage ran before the mapping stage of its source.
    #[error("Field '{field}' was consumed before it was mapped")]
    UnmappedField {
        /// The sub-map that was never populated.
        field: FieldSource,
    },

    /// A data-source stage ran without a connection configured.
    #[error("No data source connection is configured")]
    MissingConnection,
}

/// Errors produced by a data-source collaborator.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The collection/table is unknown to the driver.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A document did not fit the bound shape.
    #[error("Document rejected by shape '{shape}': {reason}")]
    ShapeMismatch {
        /// The shape name.
        shape: String,
        /// What was wrong.
        reason: String,
    },

    /// A write collided with an existing record.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// Match fields were requested but absent from their sub-map.
    #[error("Match fields missing from {source_name}: {}", missing.join(", "))]
    MissingMatchFields {
        /// The sub-map the fields were read from.
        source_name: String,
        /// The absent keys.
        missing: Vec<String>,
    },

    /// Any other driver failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Serializable failure descriptor, as the boundary receives it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureInfo {
    /// Status code.
    pub code: u16,
    /// Human readable message.
    pub message: String,
    /// Cause, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FailureInfo {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(ref stack) = self.stack {
            map.insert("stack".to_string(), serde_json::json!(stack));
        }
        map
    }
}

impl From<&Outcome> for FailureInfo {
    fn from(outcome: &Outcome) -> Self {
        Self {
            code: outcome.code,
            message: outcome.message.clone(),
            stack: outcome.cause.clone(),
        }
    }
}
