//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::context::{FieldMap, RequestContext};
use crate::core::{Outcome, StageResult};
use crate::errors::FernError;
use crate::stages::Stage;

/// A mock stage that counts calls and returns a configurable outcome.
///
/// Continues until an outcome is set.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    outcome: Mutex<Option<Outcome>>,
    call_count: Mutex<usize>,
}

impl MockStage {
    /// Creates a new mock stage that continues.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Mutex::new(None),
            call_count: Mutex::new(0),
        }
    }

    /// Sets the outcome to terminate with.
    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = Some(outcome);
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        *self.call_count.lock() += 1;
        Ok(self
            .outcome
            .lock()
            .clone()
            .map_or(StageResult::Continue, StageResult::Done))
    }
}

/// A stage that returns an error.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        Err(FernError::Internal(self.error.clone()))
    }
}

/// A stage that panics.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        panic!("stage {} exploded", self.name)
    }
}

/// A stage that answers with a pending result resolving after a delay.
#[derive(Debug)]
pub struct PendingStage {
    name: String,
    delay: Duration,
    resolved: Option<Outcome>,
}

impl PendingStage {
    /// Creates a pending stage that resolves to `Continue`.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            resolved: None,
        }
    }

    /// Creates a pending stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }

    /// Resolves to this outcome instead of continuing.
    #[must_use]
    pub fn resolving_to(mut self, outcome: Outcome) -> Self {
        self.resolved = Some(outcome);
        self
    }
}

#[async_trait]
impl Stage for PendingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        let delay = self.delay;
        let resolved = self.resolved.clone();
        Ok(StageResult::pending(async move {
            tokio::time::sleep(delay).await;
            resolved.map_or(StageResult::Continue, StageResult::Done)
        }))
    }
}

/// A stage that records the run index and store it saw, then continues.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    executions: Mutex<Vec<RecordedExecution>>,
}

/// A recorded execution.
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    /// Run index the stage ran at.
    pub index: usize,
    /// Copy of the store at call time.
    pub store: FieldMap,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Returns all recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.executions.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
        self.executions.lock().push(RecordedExecution {
            index: ctx.index(),
            store: ctx.store().clone(),
        });
        Ok(StageResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RawRequest;
    use crate::core::{Method, RouteKey};

    fn test_context() -> RequestContext {
        RequestContext::new(RouteKey::http(Method::Get, "/test"), RawRequest::new())
    }

    #[tokio::test]
    async fn test_mock_stage() {
        let stage = MockStage::new("test");
        let mut ctx = test_context();

        assert!(stage.execute(&mut ctx).await.unwrap().is_continue());
        assert_eq!(stage.call_count(), 1);

        stage.set_outcome(Outcome::new(401, "Unauthorized"));
        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(matches!(result, StageResult::Done(o) if o.code == 401));
        assert_eq!(stage.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let stage = FailingStage::new("fail", "test error");
        let err = stage.execute(&mut test_context()).await.unwrap_err();
        assert!(err.to_string().contains("test error"));
    }

    #[tokio::test]
    async fn test_pending_stage() {
        let stage = PendingStage::with_delay_ms("slow", 10).resolving_to(Outcome::ok("done"));

        let result = stage.execute(&mut test_context()).await.unwrap();
        let StageResult::Pending(future) = result else {
            panic!("expected a pending result");
        };

        let start = std::time::Instant::now();
        let resolved = future.await;
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(matches!(resolved, StageResult::Done(o) if o.is_success()));
    }

    #[tokio::test]
    async fn test_recording_stage() {
        let stage = RecordingStage::new("record");
        let mut ctx = test_context();
        ctx.store_mut().insert("k".into(), serde_json::json!(1));

        stage.execute(&mut ctx).await.unwrap();
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(stage.calls(), 2);
        assert_eq!(stage.executions()[0].store["k"], serde_json::json!(1));
    }
}
