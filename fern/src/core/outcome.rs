//! Terminal outcome type with factory methods for the common failures.

use serde::{Deserialize, Serialize};

/// A terminal stage result.
///
/// `code == 200` is a success and its payload goes to the boundary as is;
/// any other code is a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Status code.
    pub code: u16,

    /// Human readable message.
    #[serde(default)]
    pub message: String,

    /// Underlying cause (error text, validation detail, ...).
    #[serde(default, rename = "stack", skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    /// Payload for successful outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Outcome {
    /// Creates an outcome with a code and message.
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            data: None,
        }
    }

    /// Creates a successful outcome.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(200, message)
    }

    /// Creates a successful outcome carrying data.
    #[must_use]
    pub fn ok_with(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::ok(message).with_data(data)
    }

    /// The raw source a mapping stage needs is missing.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(400, "Invalid request")
    }

    /// Some required fields are missing.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(403, "Bad Request")
    }

    /// The implicit success used when a pipeline ends without a payload.
    #[must_use]
    pub fn generic_success() -> Self {
        Self::ok("OK")
    }

    /// Attaches a cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attaches a data payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Returns true if the outcome is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}
