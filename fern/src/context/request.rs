//! The raw inbound payload handed over by the transport layer.

use super::{FieldMap, FieldSource};
use serde::{Deserialize, Serialize};

/// What the transport knows about one inbound request or socket event.
///
/// Every source is optional: a transport that has no body (or no query
/// string) leaves it `None`, and mapping stages answer with `Invalid request`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRequest {
    /// Parsed body (or socket payload).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Path parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<FieldMap>,
    /// Query string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<FieldMap>,
    /// Headers, keys lower-cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<FieldMap>,
    /// Peer address, `x-forwarded-for` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
}

impl RawRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the path parameters.
    #[must_use]
    pub fn with_params(mut self, params: FieldMap) -> Self {
        self.params = Some(params);
        self
    }

    /// Adds a single path parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params
            .get_or_insert_with(FieldMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the query values.
    #[must_use]
    pub fn with_query(mut self, query: FieldMap) -> Self {
        self.query = Some(query);
        self
    }

    /// Adds a single query value.
    #[must_use]
    pub fn with_query_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.query
            .get_or_insert_with(FieldMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a header. The name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.headers
            .get_or_insert_with(FieldMap::new)
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Returns the raw map for a source.
    ///
    /// A body that is not a JSON object counts as absent. `Store` has no raw
    /// counterpart.
    #[must_use]
    pub fn source(&self, source: FieldSource) -> Option<&FieldMap> {
        match source {
            FieldSource::Body => self.body.as_ref().and_then(serde_json::Value::as_object),
            FieldSource::Params => self.params.as_ref(),
            FieldSource::Query => self.query.as_ref(),
            FieldSource::Header => self.headers.as_ref(),
            FieldSource::Store => None,
        }
    }

    /// Returns the client address, preferring `x-forwarded-for`.
    #[must_use]
    pub fn client_ip(&self) -> Option<String> {
        self.headers
            .as_ref()
            .and_then(|h| h.get("x-forwarded-for"))
            .and_then(serde_json::Value::as_str)
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| self.remote_addr.clone())
    }
}
