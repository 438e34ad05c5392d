//! # Fern
//!
//! Fluent route pipelines: every route or socket event owns an ordered list
//! of stages, run one after another against a per-request context, and every
//! run ends in exactly one response.
//!
//! Fern provides:
//!
//! - **Fluent registration**: `map_*`, `use_*`, data-source and `send` stages
//! - **A small result protocol**: continue, finish, fail, decline or suspend
//! - **Data-source stages**: existence checks, fetches, inserts and updates
//!   against a pluggable backend
//! - **A single terminal emitter** for HTTP and socket transports
//! - **Structured logging** through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fern::prelude::*;
//!
//! let mut registry = Registry::new().with_connection(source);
//! registry
//!     .endpoint("/login", Method::Post)
//!     .map_body(&["email", "password"])
//!     .use_body(schema_validator(login_schema))
//!     .bind_data_source("user", Shape::new("user"))
//!     .use_data_source(CheckIfExists::from_body(&["email", "password"]))
//!     .send(json!({"message": "Login succesful!"}));
//!
//! let dispatcher = registry.into_dispatcher();
//! let report = dispatcher.dispatch(&key, request, &responder).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod datasource;
pub mod emitter;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ExecutorConfig, FernConfig};
    pub use crate::context::{FieldMap, FieldSource, RawRequest, RequestContext};
    pub use crate::core::{Method, Outcome, RouteKey, RunState, StageResult};
    pub use crate::datasource::{
        CheckIfExists, DataFn, DataOperation, DataSource, DeleteOne, Fetch, FetchOne, FetchWhere,
        Insert, InsertMany, MatchableFromSource, Model, Shape, Update,
    };
    #[cfg(feature = "memory-store")]
    pub use crate::datasource::InMemoryDataSource;
    pub use crate::emitter::{ChannelResponder, Responder, TerminalEmitter};
    pub use crate::errors::{ConfigurationError, DataSourceError, FernError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Dispatcher, Executor, Registry, RouteBuilder, RunReport};
    pub use crate::stages::Stage;
    pub use crate::validation::{schema_validator, Schema, SchemaCheck, Validator};
}
