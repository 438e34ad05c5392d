//! Mapping stages: copy required fields from the raw request into a sub-map.

use super::Stage;
use crate::context::{extract_fields, FieldMap, FieldSource, RequestContext};
use crate::core::{Outcome, StageResult};
use crate::errors::{ConfigurationError, FernError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Replaces the `403 Bad Request` outcome; receives the missing keys.
pub type MapFailureFn = Arc<dyn Fn(&[String]) -> StageResult + Send + Sync>;

/// Replaces the `Continue` after a complete mapping; receives the sub-map.
pub type MapSuccessFn = Arc<dyn Fn(&FieldMap) -> StageResult + Send + Sync>;

/// Copies required keys of one raw source into its mapped sub-map.
///
/// All-or-nothing: either every key is present and all of them are merged
/// into the sub-map, or nothing is written.
pub struct MapStage {
    name: String,
    source: FieldSource,
    keys: Vec<String>,
    on_success: Option<MapSuccessFn>,
    on_failure: Option<MapFailureFn>,
}

impl MapStage {
    /// Creates a mapping stage for `source`.
    ///
    /// # Errors
    ///
    /// `store` has no raw counterpart and cannot be mapped.
    pub fn new(source: FieldSource, keys: &[&str]) -> Result<Self, ConfigurationError> {
        if !source.is_mappable() {
            return Err(ConfigurationError::UnmappedField { field: source });
        }
        Ok(Self::for_source(source, keys))
    }

    /// Builder-side constructor; callers pass one of `FieldSource::MAPPABLE`.
    pub(crate) fn for_source(source: FieldSource, keys: &[&str]) -> Self {
        Self {
            name: format!("map_{source}"),
            source,
            keys: keys.iter().map(|k| source.normalize_key(k)).collect(),
            on_success: None,
            on_failure: None,
        }
    }

    /// Sets the hook whose result is adopted once every key was mapped.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldMap) -> StageResult + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Sets the hook invoked instead of the default `403` when keys are missing.
    #[must_use]
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) -> StageResult + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }

    /// Returns the source this stage maps.
    #[must_use]
    pub fn source(&self) -> FieldSource {
        self.source
    }

    /// Returns the required keys.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl fmt::Debug for MapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStage")
            .field("source", &self.source)
            .field("keys", &self.keys)
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

#[async_trait]
impl Stage for MapStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        let Some(raw) = ctx.request().source(self.source) else {
            debug!(source = %self.source, "raw source absent");
            return Ok(Outcome::invalid_request().into());
        };

        let missing: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !raw.contains_key(k.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            debug!(source = %self.source, missing = ?missing, "required fields missing");
            return Ok(match &self.on_failure {
                Some(hook) => hook(&missing),
                None => Outcome::bad_request().into(),
            });
        }

        let fields = extract_fields(raw, &self.keys);
        ctx.merge_mapped(self.source, fields);
        Ok(match (&self.on_success, ctx.mapped(self.source)) {
            (Some(hook), Some(mapped)) => hook(mapped),
            _ => StageResult::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RawRequest;
    use crate::core::{Method, RouteKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx(request: RawRequest) -> RequestContext {
        RequestContext::new(RouteKey::http(Method::Post, "/login"), request)
    }

    fn code(result: &StageResult) -> Option<u16> {
        match result {
            StageResult::Done(outcome) => Some(outcome.code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_absent_source_is_invalid_request() {
        let stage = MapStage::new(FieldSource::Body, &["email"]).unwrap();
        let mut ctx = ctx(RawRequest::new());

        let result = stage.execute(&mut ctx).await.unwrap();
        assert_eq!(code(&result), Some(400));
        assert!(!ctx.is_mapped(FieldSource::Body));
    }

    #[tokio::test]
    async fn test_all_keys_present_maps_them_only() {
        let stage = MapStage::new(FieldSource::Body, &["email", "password"]).unwrap();
        let mut ctx = ctx(RawRequest::new().with_body(json!({
            "email": "a@x.com",
            "password": "p",
            "admin": true,
        })));

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(result.is_continue());

        let body = ctx.mapped(FieldSource::Body).unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body["email"], json!("a@x.com"));
        assert!(!body.contains_key("admin"));
    }

    #[tokio::test]
    async fn test_missing_key_writes_nothing() {
        let stage = MapStage::new(FieldSource::Body, &["email", "password"]).unwrap();
        let mut ctx = ctx(RawRequest::new().with_body(json!({"email": "a@x.com"})));

        let result = stage.execute(&mut ctx).await.unwrap();
        assert_eq!(code(&result), Some(403));
        assert!(ctx.mapped(FieldSource::Body).is_none());
    }

    #[tokio::test]
    async fn test_second_mapping_merges() {
        let mut ctx = ctx(RawRequest::new().with_body(json!({"a": 1, "b": 2})));
        MapStage::new(FieldSource::Body, &["a"])
            .unwrap()
            .execute(&mut ctx)
            .await
            .unwrap();
        MapStage::new(FieldSource::Body, &["b"])
            .unwrap()
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.mapped(FieldSource::Body).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_header_keys_case_insensitive() {
        let stage = MapStage::new(FieldSource::Header, &["Authorization"]).unwrap();
        let mut ctx = ctx(RawRequest::new().with_header("AUTHORIZATION", "Bearer t"));

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(result.is_continue());
        assert_eq!(
            ctx.mapped(FieldSource::Header).unwrap()["authorization"],
            json!("Bearer t")
        );
    }

    #[tokio::test]
    async fn test_failure_hook_gets_missing_keys() {
        let stage = MapStage::new(FieldSource::Query, &["page", "size"])
            .unwrap()
            .on_failure(|missing| StageResult::done(422, format!("missing: {}", missing.join(","))));
        let mut ctx = ctx(RawRequest::new().with_query_value("page", 1));

        let result = stage.execute(&mut ctx).await.unwrap();
        match result {
            StageResult::Done(outcome) => {
                assert_eq!(outcome.code, 422);
                assert_eq!(outcome.message, "missing: size");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_hook_sees_mapped_fields() {
        let stage = MapStage::new(FieldSource::Body, &["email"])
            .unwrap()
            .on_success(|body| {
                if body["email"] == json!("banned@x.com") {
                    StageResult::done(423, "Locked")
                } else {
                    StageResult::Continue
                }
            });

        let mut ok = ctx(RawRequest::new().with_body(json!({"email": "a@x.com"})));
        assert!(stage.execute(&mut ok).await.unwrap().is_continue());

        let mut locked = ctx(RawRequest::new().with_body(json!({"email": "banned@x.com"})));
        let result = stage.execute(&mut locked).await.unwrap();
        assert_eq!(code(&result), Some(423));
        assert!(locked.is_mapped(FieldSource::Body));
    }

    #[tokio::test]
    async fn test_success_hook_skipped_on_missing_keys() {
        let stage = MapStage::new(FieldSource::Body, &["email"])
            .unwrap()
            .on_success(|_| StageResult::done(500, "should not run"));
        let mut ctx = ctx(RawRequest::new().with_body(json!({})));

        let result = stage.execute(&mut ctx).await.unwrap();
        assert_eq!(code(&result), Some(403));
    }

    #[test]
    fn test_store_is_not_mappable() {
        assert!(MapStage::new(FieldSource::Store, &["x"]).is_err());
    }
}
