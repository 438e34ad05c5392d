//! Terminal emission.
//!
//! Every run ends in exactly one call into a [`Responder`], made by the
//! [`TerminalEmitter`] once the executor reaches a terminal state.

mod responders;

pub use responders::{
    ChannelResponder, Emission, RecordingResponder, ERROR_CHANNEL, RESPONSE_CHANNEL,
};

use crate::core::Outcome;
use crate::errors::FailureInfo;
use serde_json::{json, Value};
use tracing::info;

/// The response capability of the transport.
#[cfg_attr(test, mockall::automock)]
pub trait Responder: Send + Sync {
    /// Delivers a success payload.
    fn send_success(&self, payload: Value);

    /// Delivers a failure payload.
    fn send_failure(&self, code: u16, payload: Value);
}

/// Turns a terminal outcome into the boundary payload and delivers it.
#[derive(Debug, Clone, Copy)]
pub struct TerminalEmitter {
    expose_cause: bool,
}

impl Default for TerminalEmitter {
    fn default() -> Self {
        Self { expose_cause: true }
    }
}

impl TerminalEmitter {
    /// Creates an emitter.
    #[must_use]
    pub fn new(expose_cause: bool) -> Self {
        Self { expose_cause }
    }

    /// Builds the success payload: the outcome's data (or `{message}`) with
    /// `status: 200` added.
    ///
    /// Non-object data is wrapped as `{data}`.
    #[must_use]
    pub fn success_payload(outcome: &Outcome) -> Value {
        let mut payload = match &outcome.data {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
            None => {
                let mut map = serde_json::Map::new();
                map.insert("message".to_string(), json!(outcome.message));
                map
            }
        };
        payload.insert("status".to_string(), json!(200));
        Value::Object(payload)
    }

    /// Builds the failure payload `{code, message, stack?, status}`.
    #[must_use]
    pub fn failure_payload(&self, outcome: &Outcome) -> Value {
        let mut info = FailureInfo::from(outcome);
        if !self.expose_cause {
            info.stack = None;
        }

        let mut payload = info.to_dict();
        payload.insert("status".to_string(), json!(info.code));
        json!(payload)
    }

    /// Delivers the outcome. Called once per run.
    pub fn emit(&self, outcome: &Outcome, responder: &dyn Responder) {
        info!(code = outcome.code, "Send => {}", outcome.code);
        if outcome.is_success() {
            responder.send_success(Self::success_payload(outcome));
        } else {
            responder.send_failure(outcome.code, self.failure_payload(outcome));
        }
    }
}
