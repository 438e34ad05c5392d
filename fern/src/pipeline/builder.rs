//! Route registry and the fluent route builder.

use super::{Dispatcher, Executor};
use crate::config::{ExecutorConfig, FernConfig};
use crate::context::{FieldMap, FieldSource, RequestContext};
use crate::core::{Method, RouteKey, StageResult};
use crate::datasource::{DataOperation, DataSource, DataSourceDescriptor, Shape};
use crate::events::EventSink;
use crate::stages::{
    BindDataSourceStage, FnStage, MapStage, SendStage, SendWith, Stage, UseDataSourceStage,
    UseStage,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The ordered stages of one route.
pub type StageList = Vec<Arc<dyn Stage>>;

/// Pipelines keyed by route, built once at startup.
///
/// ```ignore
/// let mut registry = Registry::new();
/// registry
///     .endpoint("/login", Method::Post)
///     .map_body(&["email", "password"])
///     .send(json!({"message": "Welcome"}));
/// let dispatcher = registry.into_dispatcher();
/// ```
#[derive(Default)]
pub struct Registry {
    routes: HashMap<RouteKey, StageList>,
    config: ExecutorConfig,
    connection: Option<Arc<dyn DataSource>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl Registry {
    /// Creates an HTTP registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a socket registry (`SocketError` failure prefix).
    #[must_use]
    pub fn socket() -> Self {
        Self::new().with_executor_config(ExecutorConfig::socket())
    }

    /// Creates a registry from a full configuration.
    #[must_use]
    pub fn from_config(config: &FernConfig) -> Self {
        Self::new().with_executor_config(config.executor.clone())
    }

    /// Sets the executor configuration.
    #[must_use]
    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the data-source connection every run gets.
    #[must_use]
    pub fn with_connection(mut self, connection: Arc<dyn DataSource>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Sets the event sink every run reports to.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Starts a pipeline for `key`.
    ///
    /// The key is recorded immediately with no stages, so a builder that is
    /// never committed leaves an invalid route behind.
    pub fn register(&mut self, key: RouteKey) -> RouteBuilder<'_> {
        self.routes.insert(key.clone(), Vec::new());
        RouteBuilder {
            registry: self,
            key,
            stages: Vec::new(),
        }
    }

    /// Starts an HTTP pipeline.
    pub fn endpoint(&mut self, path: impl Into<String>, method: Method) -> RouteBuilder<'_> {
        self.register(RouteKey::http(method, path))
    }

    /// Starts a socket event pipeline.
    pub fn on(&mut self, event: impl Into<String>) -> RouteBuilder<'_> {
        self.register(RouteKey::event(event))
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the stage names of a route.
    #[must_use]
    pub fn stage_names(&self, key: &RouteKey) -> Option<Vec<String>> {
        self.routes
            .get(key)
            .map(|stages| stages.iter().map(|s| s.name().to_string()).collect())
    }

    /// Freezes the registry for request handling.
    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(
            self.routes,
            Executor::new(self.config),
            self.connection,
            self.event_sink,
        )
    }

    fn commit(&mut self, key: RouteKey, stages: StageList) {
        debug!(route = %key, stages = stages.len(), "route committed");
        self.routes.insert(key, stages);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("connection", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

/// Appends stages to one route; `send`, `send_with` or `finish` commits them.
///
/// Committing replaces whatever the route had before.
#[must_use = "a route builder does nothing until it is committed"]
pub struct RouteBuilder<'a> {
    registry: &'a mut Registry,
    key: RouteKey,
    stages: StageList,
}

impl<'a> RouteBuilder<'a> {
    /// Returns the route being built.
    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    /// Appends any stage.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a closure stage with write access to the context.
    pub fn step<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.stage(Arc::new(FnStage::new(name, func)))
    }

    fn map(self, source: FieldSource, keys: &[&str]) -> Self {
        self.stage(Arc::new(MapStage::for_source(source, keys)))
    }

    fn map_or<F>(self, source: FieldSource, keys: &[&str], on_failure: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.stage(Arc::new(MapStage::for_source(source, keys).on_failure(on_failure)))
    }

    /// Requires `keys` in the body and maps them.
    pub fn map_body(self, keys: &[&str]) -> Self {
        self.map(FieldSource::Body, keys)
    }

    /// Requires `keys` in the path parameters and maps them.
    pub fn map_params(self, keys: &[&str]) -> Self {
        self.map(FieldSource::Params, keys)
    }

    /// Requires `keys` in the query string and maps them.
    pub fn map_query(self, keys: &[&str]) -> Self {
        self.map(FieldSource::Query, keys)
    }

    /// Requires `keys` in the headers and maps them. Names are case-insensitive.
    pub fn map_header(self, keys: &[&str]) -> Self {
        self.map(FieldSource::Header, keys)
    }

    /// Like [`Self::map_body`], with a custom result for missing keys.
    pub fn map_body_or<F>(self, keys: &[&str], on_failure: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.map_or(FieldSource::Body, keys, on_failure)
    }

    /// Like [`Self::map_params`], with a custom result for missing keys.
    pub fn map_params_or<F>(self, keys: &[&str], on_failure: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.map_or(FieldSource::Params, keys, on_failure)
    }

    /// Like [`Self::map_query`], with a custom result for missing keys.
    pub fn map_query_or<F>(self, keys: &[&str], on_failure: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.map_or(FieldSource::Query, keys, on_failure)
    }

    /// Like [`Self::map_header`], with a custom result for missing keys.
    pub fn map_header_or<F>(self, keys: &[&str], on_failure: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.map_or(FieldSource::Header, keys, on_failure)
    }

    fn consume<F>(self, source: FieldSource, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.stage(Arc::new(UseStage::new(source, callback)))
    }

    /// Hands the mapped body to `callback`.
    pub fn use_body<F>(self, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.consume(FieldSource::Body, callback)
    }

    /// Hands the mapped path parameters to `callback`.
    pub fn use_params<F>(self, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.consume(FieldSource::Params, callback)
    }

    /// Hands the mapped query string to `callback`.
    pub fn use_query<F>(self, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.consume(FieldSource::Query, callback)
    }

    /// Hands the mapped headers to `callback`.
    pub fn use_header<F>(self, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.consume(FieldSource::Header, callback)
    }

    /// Hands the store to `callback`.
    pub fn use_store<F>(self, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        self.consume(FieldSource::Store, callback)
    }

    /// Appends a `use_*` stage without a callback; it always continues.
    pub fn use_source(self, source: FieldSource) -> Self {
        self.stage(Arc::new(UseStage::passthrough(source)))
    }

    /// Binds the collection later data-access stages target.
    pub fn bind_data_source(self, name: impl Into<String>, shape: Shape) -> Self {
        self.stage(Arc::new(BindDataSourceStage::new(DataSourceDescriptor::new(
            name, shape,
        ))))
    }

    /// Runs a data operation against the bound collection.
    pub fn use_data_source(self, operation: impl DataOperation + 'static) -> Self {
        self.stage(Arc::new(UseDataSourceStage::new(operation)))
    }

    /// Appends a `send` of a literal payload and commits the route.
    pub fn send(self, payload: Value) -> &'a mut Registry {
        self.stage(Arc::new(SendStage::new(payload))).finish()
    }

    /// Appends a `send` of a payload built from the context and commits the route.
    pub fn send_with<F>(self, func: F) -> &'a mut Registry
    where
        F: Fn(&RequestContext) -> Value + Send + Sync + 'static,
    {
        self.stage(Arc::new(SendWith::new(func))).finish()
    }

    /// Commits the route without a `send` stage.
    pub fn finish(self) -> &'a mut Registry {
        let Self {
            registry,
            key,
            stages,
        } = self;
        registry.commit(key, stages);
        registry
    }
}

impl fmt::Debug for RouteBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("key", &self.key)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_register_records_empty_route() {
        let mut registry = Registry::new();
        let _ = registry.endpoint("/login", Method::Post).map_body(&["email"]);

        let key = RouteKey::http(Method::Post, "/login");
        assert_eq!(registry.stage_names(&key), Some(Vec::new()));
    }

    #[test]
    fn test_stages_kept_in_order() {
        let mut registry = Registry::new();
        registry
            .endpoint("/login", Method::Post)
            .map_body(&["email", "password"])
            .use_body(|_, _| StageResult::Continue)
            .step("audit", |_| StageResult::Continue)
            .send(json!({"message": "Welcome"}));

        let names = registry
            .stage_names(&RouteKey::http(Method::Post, "/login"))
            .unwrap();
        assert_eq!(names, vec!["map_body", "use_body", "audit", "send"]);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.on("chat").map_body(&["text"]).finish();
        registry.on("chat").send(json!({}));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.stage_names(&RouteKey::event("chat")).unwrap(),
            vec!["send"]
        );
    }

    #[test]
    fn test_chained_registrations() {
        let mut registry = Registry::new();
        registry
            .endpoint("/a", Method::Get)
            .send(json!({}))
            .endpoint("/b", Method::Delete)
            .finish();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_socket_registry_prefix() {
        let registry = Registry::socket();
        assert_eq!(registry.config.failure_prefix, "SocketError");
    }
}
