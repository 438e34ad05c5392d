//! Data-source plumbing for data-access stages.
//!
//! This module provides:
//! - The connection and model traits a driver implements
//! - Descriptors and value shapes
//! - Reusable data-access operations (`CheckIfExists`, `FetchOne`, ...)
//! - An in-memory driver behind the `memory-store` feature

mod matching;
#[cfg(feature = "memory-store")]
mod memory;
mod model;
mod operations;

pub use matching::{FieldMatch, MatchableFromSource};
#[cfg(feature = "memory-store")]
pub use memory::{InMemoryDataSource, MemoryCollection};
#[cfg(test)]
pub use model::MockModel;
pub use model::{
    DataSource, DataSourceDescriptor, Document, FieldKind, FindOptions, Model, Shape,
    UpdateResult,
};
pub use operations::{
    CheckIfExists, DataFn, DataOperation, DeleteOne, Fetch, FetchOne, FetchWhere, Found, Insert,
    InsertMany, Missing, Update, DEFAULT_RESULT_KEY,
};
