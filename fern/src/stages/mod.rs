//! Stage trait and implementations.
//!
//! Stages are the units of work a route pipeline runs, one after another,
//! against the same [`RequestContext`].

mod consume;
mod data;
mod mapping;
mod send;

pub use consume::{ConsumeFn, UseStage};
pub use data::{BindDataSourceStage, UseDataSourceStage};
pub use mapping::{MapFailureFn, MapStage, MapSuccessFn};
pub use send::{SendStage, SendWith};

use crate::context::RequestContext;
use crate::core::StageResult;
use crate::errors::FernError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// A stage holds only its configuration; everything per-request lives on the
/// context it is handed.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The context of the current run
    ///
    /// # Errors
    ///
    /// An error fails the run with a generic `Function failed` outcome
    /// carrying the error as its cause.
    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        Ok((self.func)(ctx))
    }
}

/// A stage that always continues.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        Ok(StageResult::Continue)
    }
}
