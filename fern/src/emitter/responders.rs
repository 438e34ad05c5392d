//! Responder adapters.

use super::Responder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Channel HTTP emissions are delivered on.
pub const RESPONSE_CHANNEL: &str = "response";

/// Channel socket failures are delivered on.
pub const ERROR_CHANNEL: &str = "error";

/// One delivered response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    /// Where it went: `response` for HTTP, the event name or `error` for sockets.
    pub channel: String,
    /// Status code.
    pub code: u16,
    /// The payload.
    pub payload: Value,
}

impl Emission {
    /// Returns true for success emissions.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

#[derive(Debug, Clone)]
enum Flavour {
    Http,
    Socket(String),
}

/// Forwards emissions to a tokio channel, for transport adapters.
#[derive(Debug, Clone)]
pub struct ChannelResponder {
    flavour: Flavour,
    tx: mpsc::UnboundedSender<Emission>,
}

impl ChannelResponder {
    /// Creates an HTTP responder; everything goes to `response`.
    #[must_use]
    pub fn http() -> (Self, mpsc::UnboundedReceiver<Emission>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                flavour: Flavour::Http,
                tx,
            },
            rx,
        )
    }

    /// Creates a socket responder for `event`.
    ///
    /// Successes are emitted on the event's own channel, failures on `error`.
    #[must_use]
    pub fn socket(event: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Emission>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                flavour: Flavour::Socket(event.into()),
                tx,
            },
            rx,
        )
    }

    fn deliver(&self, channel: &str, code: u16, payload: Value) {
        let emission = Emission {
            channel: channel.to_string(),
            code,
            payload,
        };
        if self.tx.send(emission).is_err() {
            warn!(channel, code, "responder channel closed, emission dropped");
        }
    }
}

impl Responder for ChannelResponder {
    fn send_success(&self, payload: Value) {
        match &self.flavour {
            Flavour::Http => self.deliver(RESPONSE_CHANNEL, 200, payload),
            Flavour::Socket(event) => self.deliver(event, 200, payload),
        }
    }

    fn send_failure(&self, code: u16, payload: Value) {
        match &self.flavour {
            Flavour::Http => self.deliver(RESPONSE_CHANNEL, code, payload),
            Flavour::Socket(_) => self.deliver(ERROR_CHANNEL, code, payload),
        }
    }
}

/// Keeps every emission, for tests.
#[derive(Debug, Default)]
pub struct RecordingResponder {
    emissions: Mutex<Vec<Emission>>,
}

impl RecordingResponder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all emissions so far.
    #[must_use]
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    /// Returns the number of emissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emissions.lock().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emissions.lock().is_empty()
    }

    /// Returns the last emission.
    #[must_use]
    pub fn last(&self) -> Option<Emission> {
        self.emissions.lock().last().cloned()
    }
}

impl Responder for RecordingResponder {
    fn send_success(&self, payload: Value) {
        self.emissions.lock().push(Emission {
            channel: RESPONSE_CHANNEL.to_string(),
            code: 200,
            payload,
        });
    }

    fn send_failure(&self, code: u16, payload: Value) {
        self.emissions.lock().push(Emission {
            channel: RESPONSE_CHANNEL.to_string(),
            code,
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_http_channel() {
        let (responder, mut rx) = ChannelResponder::http();
        responder.send_failure(403, json!({"code": 403}));

        let emission = rx.recv().await.unwrap();
        assert_eq!(emission.channel, RESPONSE_CHANNEL);
        assert!(!emission.is_success());
    }

    #[tokio::test]
    async fn test_socket_channels() {
        let (responder, mut rx) = ChannelResponder::socket("chat");
        responder.send_success(json!({"ok": true}));
        responder.send_failure(500, json!({"code": 500}));

        assert_eq!(rx.recv().await.unwrap().channel, "chat");
        assert_eq!(rx.recv().await.unwrap().channel, ERROR_CHANNEL);
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (responder, rx) = ChannelResponder::http();
        drop(rx);
        responder.send_success(json!({}));
    }

    #[test]
    fn test_recording_responder() {
        let responder = RecordingResponder::new();
        assert!(responder.is_empty());
        responder.send_success(json!({"status": 200}));

        assert_eq!(responder.len(), 1);
        assert!(responder.last().unwrap().is_success());
    }
}
