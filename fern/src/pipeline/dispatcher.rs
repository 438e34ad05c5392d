//! The frozen registry that transport adapters dispatch into.

use super::{Executor, RunReport, StageList};
use crate::cancellation::CancellationToken;
use crate::context::{RawRequest, RequestContext};
use crate::core::RouteKey;
use crate::datasource::DataSource;
use crate::emitter::Responder;
use crate::events::EventSink;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct Inner {
    routes: HashMap<RouteKey, StageList>,
    executor: Executor,
    connection: Option<Arc<dyn DataSource>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

/// Read-only routes plus the executor, cheap to clone across tasks.
///
/// Every dispatch gets a fresh context; the dispatcher itself holds no
/// per-request state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub(crate) fn new(
        routes: HashMap<RouteKey, StageList>,
        executor: Executor,
        connection: Option<Arc<dyn DataSource>>,
        event_sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                routes,
                executor,
                connection,
                event_sink,
            }),
        }
    }

    /// Returns true if `key` is registered (with or without stages).
    #[must_use]
    pub fn contains(&self, key: &RouteKey) -> bool {
        self.inner.routes.contains_key(key)
    }

    /// Returns the registered keys.
    pub fn routes(&self) -> impl Iterator<Item = &RouteKey> {
        self.inner.routes.keys()
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    /// Creates the context a run on `key` starts from.
    #[must_use]
    pub fn context(&self, key: &RouteKey, request: RawRequest) -> RequestContext {
        let mut ctx = RequestContext::new(key.clone(), request);
        if let Some(connection) = &self.inner.connection {
            ctx = ctx.with_connection(connection.clone());
        }
        if let Some(sink) = &self.inner.event_sink {
            ctx = ctx.with_event_sink(sink.clone());
        }
        ctx
    }

    /// Runs the pipeline for `key` and emits its outcome to `responder`.
    ///
    /// An unregistered key fails exactly like a registered empty one.
    pub async fn dispatch(
        &self,
        key: &RouteKey,
        request: RawRequest,
        responder: &dyn Responder,
    ) -> RunReport {
        self.dispatch_with_cancellation(key, request, responder, CancellationToken::new())
            .await
    }

    /// Like [`Self::dispatch`], with a token the transport can cancel.
    pub async fn dispatch_with_cancellation(
        &self,
        key: &RouteKey,
        request: RawRequest,
        responder: &dyn Responder,
        token: CancellationToken,
    ) -> RunReport {
        let mut ctx = self.context(key, request).with_cancellation(token);
        let stages = self
            .inner
            .routes
            .get(key)
            .map_or(&[][..], Vec::as_slice);

        self.inner.executor.execute(stages, &mut ctx, responder).await
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.routes.len())
            .field("executor", &self.inner.executor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;
    use crate::emitter::RecordingResponder;
    use crate::pipeline::Registry;
    use serde_json::json;

    #[tokio::test]
    async fn test_unregistered_matches_empty() {
        let mut registry = Registry::new();
        registry.endpoint("/empty", Method::Get).finish();
        let dispatcher = registry.into_dispatcher();

        let first = RecordingResponder::new();
        let empty = dispatcher
            .dispatch(&RouteKey::http(Method::Get, "/empty"), RawRequest::new(), &first)
            .await;
        let second = RecordingResponder::new();
        let missing = dispatcher
            .dispatch(&RouteKey::http(Method::Get, "/nowhere"), RawRequest::new(), &second)
            .await;

        assert_eq!(empty.outcome.code, missing.outcome.code);
        assert_eq!(empty.outcome.message, missing.outcome.message);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_routes() {
        let mut registry = Registry::new();
        registry.on("ping").send(json!({"pong": true}));
        let dispatcher = registry.into_dispatcher();
        let clone = dispatcher.clone();

        let handle = tokio::spawn(async move {
            let responder = RecordingResponder::new();
            clone
                .dispatch(&RouteKey::event("ping"), RawRequest::new(), &responder)
                .await
                .is_success()
        });

        assert!(handle.await.unwrap());
        assert!(dispatcher.contains(&RouteKey::event("ping")));
    }
}
