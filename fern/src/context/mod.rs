//! Per-run request context.
//!
//! This module provides:
//! - The raw request handed over by the transport
//! - Named field sources and the sub-maps mapping stages fill
//! - The mutable context threaded through a pipeline run

mod execution;
mod fields;
mod request;

pub use execution::RequestContext;
pub use fields::{extract_fields, FieldMap, FieldSource};
pub use request::RawRequest;
