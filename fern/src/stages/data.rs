//! Data-source stages.

use super::Stage;
use crate::context::RequestContext;
use crate::core::StageResult;
use crate::datasource::{DataOperation, DataSourceDescriptor};
use crate::errors::{ConfigurationError, FernError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// Records which collection later data-access stages target. Always continues.
#[derive(Debug, Clone)]
pub struct BindDataSourceStage {
    descriptor: DataSourceDescriptor,
}

impl BindDataSourceStage {
    /// Creates a bind stage.
    #[must_use]
    pub fn new(descriptor: DataSourceDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Stage for BindDataSourceStage {
    fn name(&self) -> &str {
        "bind_data_source"
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        ctx.bind_data_source(self.descriptor.clone());
        Ok(StageResult::Continue)
    }
}

/// Runs a [`DataOperation`] against the bound data source.
///
/// Data-source failures are logged and soften into `Declined`; wiring errors
/// (no connection, unmapped match source) propagate.
pub struct UseDataSourceStage {
    operation: Arc<dyn DataOperation>,
}

impl UseDataSourceStage {
    /// Creates a stage running `operation`.
    pub fn new(operation: impl DataOperation + 'static) -> Self {
        Self {
            operation: Arc::new(operation),
        }
    }
}

impl fmt::Debug for UseDataSourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseDataSourceStage")
            .field("operation", &self.operation.name())
            .finish()
    }
}

#[async_trait]
impl Stage for UseDataSourceStage {
    fn name(&self) -> &str {
        self.operation.name()
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        let Some(descriptor) = ctx.data_source() else {
            warn!(operation = self.operation.name(), "no data source bound");
            return Ok(StageResult::Declined);
        };
        let connection = ctx
            .connection()
            .ok_or(ConfigurationError::MissingConnection)?;

        let model = match connection.model(descriptor) {
            Ok(model) => model,
            Err(e) => {
                error!(model = %descriptor.name, error = %e, "failed to resolve model");
                return Ok(StageResult::Declined);
            }
        };

        match self.operation.run(model, ctx).await {
            Err(FernError::DataSource(e)) => {
                error!(operation = self.operation.name(), error = %e, "data source operation failed");
                Ok(StageResult::Declined)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FieldMap, FieldSource, RawRequest};
    use crate::core::{Method, RouteKey};
    use crate::datasource::{
        CheckIfExists, DataSource, DeleteOne, MatchableFromSource, MockModel, Model, Shape,
    };
    use crate::errors::DataSourceError;
    use serde_json::json;

    struct FixedSource(Arc<dyn Model>);

    impl DataSource for FixedSource {
        fn model(&self, _: &DataSourceDescriptor) -> Result<Arc<dyn Model>, DataSourceError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl DataSource for BrokenSource {
        fn model(&self, d: &DataSourceDescriptor) -> Result<Arc<dyn Model>, DataSourceError> {
            Err(DataSourceError::UnknownModel(d.name.clone()))
        }
    }

    fn descriptor() -> DataSourceDescriptor {
        DataSourceDescriptor::new("user", Shape::new("User"))
    }

    fn ctx() -> RequestContext {
        let mut ctx = RequestContext::new(RouteKey::http(Method::Post, "/login"), RawRequest::new());
        let mut body = FieldMap::new();
        body.insert("email".into(), json!("a@x.com"));
        ctx.merge_mapped(FieldSource::Body, body);
        ctx
    }

    #[tokio::test]
    async fn test_bind_always_continues() {
        let mut ctx = ctx();
        let result = BindDataSourceStage::new(descriptor())
            .execute(&mut ctx)
            .await
            .unwrap();
        assert!(result.is_continue());
        assert_eq!(ctx.data_source().unwrap().name, "user");
    }

    #[tokio::test]
    async fn test_unbound_declines() {
        let stage = UseDataSourceStage::new(CheckIfExists::from_body(&["email"]));
        let mut ctx = ctx().with_connection(Arc::new(BrokenSource));

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(matches!(result, StageResult::Declined));
    }

    #[tokio::test]
    async fn test_missing_connection_is_configuration_error() {
        let stage = UseDataSourceStage::new(CheckIfExists::from_body(&["email"]));
        let mut ctx = ctx();
        ctx.bind_data_source(descriptor());

        let err = stage.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            FernError::Configuration(ConfigurationError::MissingConnection)
        ));
    }

    #[tokio::test]
    async fn test_unknown_model_declines() {
        let stage = UseDataSourceStage::new(CheckIfExists::from_body(&["email"]));
        let mut ctx = ctx().with_connection(Arc::new(BrokenSource));
        ctx.bind_data_source(descriptor());

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(matches!(result, StageResult::Declined));
    }

    #[tokio::test]
    async fn test_backend_error_softens_to_declined() {
        let mut mock = MockModel::new();
        mock.expect_find_one()
            .returning(|_| Err(DataSourceError::Backend(anyhow::anyhow!("timeout"))));
        let stage = UseDataSourceStage::new(CheckIfExists::from_body(&["email"]));
        let mut ctx = ctx().with_connection(Arc::new(FixedSource(Arc::new(mock))));
        ctx.bind_data_source(descriptor());

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(matches!(result, StageResult::Declined));
    }

    #[tokio::test]
    async fn test_operation_result_adopted() {
        let mut mock = MockModel::new();
        mock.expect_find_one().returning(|_| Ok(None));
        let stage = UseDataSourceStage::new(CheckIfExists::from_body(&["email"]));
        let mut ctx = ctx().with_connection(Arc::new(FixedSource(Arc::new(mock))));
        ctx.bind_data_source(descriptor());

        assert_eq!(stage.name(), "check_if_exists");
        assert!(stage.execute(&mut ctx).await.unwrap().is_continue());
    }

    #[tokio::test]
    async fn test_missing_match_field_declines_without_touching_model() {
        let stage = UseDataSourceStage::new(DeleteOne::from_body(&["email", "userid"]));
        let mut ctx = ctx().with_connection(Arc::new(FixedSource(Arc::new(MockModel::new()))));
        ctx.bind_data_source(descriptor());

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(matches!(result, StageResult::Declined));
    }
}
