//! The terminal `send` stage.
//!
//! Sending only stages the payload; the emitter delivers it once the run
//! succeeds, so a later failing stage still wins.

use super::Stage;
use crate::context::RequestContext;
use crate::core::StageResult;
use crate::errors::FernError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Stages a literal payload.
#[derive(Debug, Clone)]
pub struct SendStage {
    payload: Value,
}

impl SendStage {
    /// Creates a send stage.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl Stage for SendStage {
    fn name(&self) -> &str {
        "send"
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        ctx.stage_response(self.payload.clone());
        Ok(StageResult::Continue)
    }
}

/// Stages the payload a callback builds from the context.
pub struct SendWith<F>
where
    F: Fn(&RequestContext) -> Value + Send + Sync,
{
    func: F,
}

impl<F> SendWith<F>
where
    F: Fn(&RequestContext) -> Value + Send + Sync,
{
    /// Creates a send stage around `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for SendWith<F>
where
    F: Fn(&RequestContext) -> Value + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendWith").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Stage for SendWith<F>
where
    F: Fn(&RequestContext) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        "send"
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        let payload = (self.func)(ctx);
        ctx.stage_response(payload);
        Ok(StageResult::Continue)
    }
}
