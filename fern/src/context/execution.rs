//! The mutable per-run context threaded through every stage.

use super::{FieldMap, FieldSource, RawRequest};
use crate::cancellation::CancellationToken;
use crate::core::{Method, RouteKey};
use crate::datasource::{DataSource, DataSourceDescriptor};
use crate::errors::ConfigurationError;
use crate::events::{get_event_sink, EventSink};
use std::sync::Arc;
use uuid::Uuid;

/// The mutable context for one pipeline run.
///
/// A context is created per inbound event, owned by the executor for the
/// run, and dropped after the terminal emission. Mapped sub-maps start out
/// as `None` and only their mapping stage may fill them; `store` always
/// exists.
pub struct RequestContext {
    run_id: Uuid,
    route: RouteKey,
    request: RawRequest,
    body: Option<FieldMap>,
    params: Option<FieldMap>,
    query: Option<FieldMap>,
    header: Option<FieldMap>,
    store: FieldMap,
    data_source: Option<DataSourceDescriptor>,
    connection: Option<Arc<dyn DataSource>>,
    response: Option<serde_json::Value>,
    cancellation: CancellationToken,
    event_sink: Arc<dyn EventSink>,
    index: usize,
}

impl RequestContext {
    /// Creates a context for a request on `route`.
    ///
    /// `store` starts empty, plus `ip` when the transport knows the peer.
    #[must_use]
    pub fn new(route: RouteKey, request: RawRequest) -> Self {
        let mut store = FieldMap::new();
        if let Some(ip) = request.client_ip() {
            store.insert("ip".to_string(), serde_json::Value::String(ip));
        }

        Self {
            run_id: Uuid::new_v4(),
            route,
            request,
            body: None,
            params: None,
            query: None,
            header: None,
            store,
            data_source: None,
            connection: None,
            response: None,
            cancellation: CancellationToken::new(),
            event_sink: get_event_sink(),
            index: 0,
        }
    }

    /// Sets the data-source connection stages resolve models against.
    #[must_use]
    pub fn with_connection(mut self, connection: Arc<dyn DataSource>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the route this run was dispatched on.
    #[must_use]
    pub fn route(&self) -> &RouteKey {
        &self.route
    }

    /// Returns the HTTP method, `None` for socket events.
    #[must_use]
    pub fn method(&self) -> Option<Method> {
        self.route.method()
    }

    /// Returns the event name for socket runs.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        match &self.route {
            RouteKey::Event { name } => Some(name),
            RouteKey::Http { .. } => None,
        }
    }

    /// Returns the raw transport payload.
    #[must_use]
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    /// Returns a mapped sub-map, `None` if it was never mapped.
    #[must_use]
    pub fn mapped(&self, source: FieldSource) -> Option<&FieldMap> {
        match source {
            FieldSource::Body => self.body.as_ref(),
            FieldSource::Params => self.params.as_ref(),
            FieldSource::Query => self.query.as_ref(),
            FieldSource::Header => self.header.as_ref(),
            FieldSource::Store => Some(&self.store),
        }
    }

    /// Returns a mapped sub-map for consumption.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnmappedField` if no mapping stage has
    /// populated the source yet.
    pub fn field(&self, source: FieldSource) -> Result<&FieldMap, ConfigurationError> {
        self.mapped(source)
            .ok_or(ConfigurationError::UnmappedField { field: source })
    }

    /// Returns true if the sub-map has been mapped.
    #[must_use]
    pub fn is_mapped(&self, source: FieldSource) -> bool {
        self.mapped(source).is_some()
    }

    /// Merges `fields` into a mapped sub-map, creating it if needed.
    pub(crate) fn merge_mapped(&mut self, source: FieldSource, fields: FieldMap) {
        let slot = match source {
            FieldSource::Body => &mut self.body,
            FieldSource::Params => &mut self.params,
            FieldSource::Query => &mut self.query,
            FieldSource::Header => &mut self.header,
            FieldSource::Store => {
                self.store.extend(fields);
                return;
            }
        };
        slot.get_or_insert_with(FieldMap::new).extend(fields);
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &FieldMap {
        &self.store
    }

    /// Returns the store for writing.
    pub fn store_mut(&mut self) -> &mut FieldMap {
        &mut self.store
    }

    /// Binds the data source later data-access stages target.
    pub fn bind_data_source(&mut self, descriptor: DataSourceDescriptor) {
        self.data_source = Some(descriptor);
    }

    /// Returns the bound data-source descriptor.
    #[must_use]
    pub fn data_source(&self) -> Option<&DataSourceDescriptor> {
        self.data_source.as_ref()
    }

    /// Returns the data-source connection.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<dyn DataSource>> {
        self.connection.as_ref()
    }

    /// Stages the payload the terminal emitter delivers on success.
    pub fn stage_response(&mut self, payload: serde_json::Value) {
        self.response = Some(payload);
    }

    /// Returns the staged response payload.
    #[must_use]
    pub fn staged_response(&self) -> Option<&serde_json::Value> {
        self.response.as_ref()
    }

    pub(crate) fn take_response(&mut self) -> Option<serde_json::Value> {
        self.response.take()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the index of the stage currently executing.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Emits an event enriched with the run ID and route.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or(serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
            map.insert("route".to_string(), serde_json::json!(self.route.to_string()));
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("run_id", &self.run_id)
            .field("route", &self.route)
            .field("body", &self.body)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("header", &self.header)
            .field("store", &self.store)
            .field("data_source", &self.data_source)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
