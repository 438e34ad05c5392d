//! Consumption stages: hand a mapped sub-map to user code.

use super::Stage;
use crate::context::{FieldMap, FieldSource, RequestContext};
use crate::core::StageResult;
use crate::errors::FernError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Callback of a `use_*` stage. Its return value is adopted verbatim.
pub type ConsumeFn = Arc<dyn Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync>;

/// Invokes a callback with one mapped sub-map.
pub struct UseStage {
    name: String,
    source: FieldSource,
    callback: Option<ConsumeFn>,
}

impl UseStage {
    /// Creates a stage that hands `source` to `callback`.
    pub fn new<F>(source: FieldSource, callback: F) -> Self
    where
        F: Fn(&FieldMap, &RequestContext) -> StageResult + Send + Sync + 'static,
    {
        Self {
            name: format!("use_{source}"),
            source,
            callback: Some(Arc::new(callback)),
        }
    }

    /// Creates a stage without a callback. It continues without reading
    /// `source`, mapped or not.
    #[must_use]
    pub fn passthrough(source: FieldSource) -> Self {
        Self {
            name: format!("use_{source}"),
            source,
            callback: None,
        }
    }
}

impl fmt::Debug for UseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseStage")
            .field("source", &self.source)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[async_trait]
impl Stage for UseStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        let Some(callback) = &self.callback else {
            return Ok(StageResult::Continue);
        };
        let fields = ctx.field(self.source)?;
        Ok(callback(fields, ctx))
    }
}
