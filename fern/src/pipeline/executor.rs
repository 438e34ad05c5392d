//! Sequential pipeline executor.
//!
//! Runs the stages of one pipeline in order against one context, applying
//! the result protocol after every stage, and ends every run in exactly one
//! terminal state.

use crate::cancellation::CancellationToken;
use crate::config::ExecutorConfig;
use crate::context::RequestContext;
use crate::core::{resolve, Outcome, PendingResult, RunState, StageResult, Transition};
use crate::emitter::{Responder, TerminalEmitter};
use crate::errors::{ConfigurationError, FernError, INVALID_IMPLEMENTATION};
use crate::events::{RUN_FAILED, RUN_STARTED, RUN_SUCCEEDED, STAGE_COMPLETED};
use crate::observability::{RunSpanAttributes, SpanTimer, StageSpanAttributes};
use crate::stages::Stage;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What a run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run ID.
    pub run_id: Uuid,
    /// Final state, always terminal.
    pub state: RunState,
    /// The outcome handed to the emitter.
    pub outcome: Outcome,
    /// Number of stages that were invoked.
    pub stages_run: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }
}

/// Drives pipelines.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs `stages` and delivers the terminal outcome to `responder`.
    pub async fn execute(
        &self,
        stages: &[Arc<dyn Stage>],
        ctx: &mut RequestContext,
        responder: &dyn Responder,
    ) -> RunReport {
        let report = self.run(stages, ctx).await;
        TerminalEmitter::new(self.config.expose_cause).emit(&report.outcome, responder);
        report
    }

    /// Runs `stages` to a terminal state without emitting.
    pub async fn run(&self, stages: &[Arc<dyn Stage>], ctx: &mut RequestContext) -> RunReport {
        let attrs = RunSpanAttributes::from_context(ctx, stages.len());
        let span = info_span!("run", run_id = %attrs.run_id, route = %attrs.route);

        async move {
            let started_at = Utc::now();
            let timer = SpanTimer::start(attrs.route.clone());
            info!(stages = stages.len(), client_ip = ?attrs.client_ip, "Received");
            ctx.try_emit_event(RUN_STARTED, Some(serde_json::json!(attrs.to_attributes())));

            let mut stages_run = 0;
            let (state, outcome) = if stages.is_empty() {
                let err = ConfigurationError::EmptyPipeline(ctx.route().clone());
                error!(error = %err, "no stages to run");
                (
                    RunState::Failed,
                    Outcome::new(500, INVALID_IMPLEMENTATION).with_cause(err.to_string()),
                )
            } else {
                self.drive(stages, ctx, &mut stages_run).await
            };

            let event = if state.is_success() { RUN_SUCCEEDED } else { RUN_FAILED };
            ctx.try_emit_event(
                event,
                Some(serde_json::json!({ "code": outcome.code, "stages_run": stages_run })),
            );

            RunReport {
                run_id: ctx.run_id(),
                state,
                outcome,
                stages_run,
                started_at,
                duration_ms: timer.finish(),
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        stages: &[Arc<dyn Stage>],
        ctx: &mut RequestContext,
        stages_run: &mut usize,
    ) -> (RunState, Outcome) {
        let prefix = self.config.failure_prefix.as_str();

        for (index, stage) in stages.iter().enumerate() {
            if ctx.is_cancelled() {
                let reason = ctx.cancellation().reason().unwrap_or_default();
                warn!(index, reason = %reason, "run cancelled");
                return (RunState::Failed, FernError::Cancelled(reason).to_outcome(prefix));
            }

            ctx.set_index(index);
            *stages_run += 1;
            debug!(stage = stage.name(), state = %RunState::Running(index), "stage started");

            let timer = SpanTimer::start(stage.name());
            let mut transition = match invoke(stage.as_ref(), ctx).await {
                Ok(result) => resolve(result, prefix),
                Err(e) => Transition::Fail(self.stage_failure(stage.name(), &e)),
            };

            loop {
                let attrs = StageSpanAttributes::new(stage.name(), index);
                match transition {
                    Transition::Suspend(future) => {
                        debug!(stage = stage.name(), state = %RunState::Suspended(index), "stage suspended");
                        let token = ctx.cancellation().clone();
                        transition = match self.settle(stage.name(), future, &token).await {
                            Ok(result) => resolve(result, prefix),
                            Err(e) => Transition::Fail(self.stage_failure(stage.name(), &e)),
                        };
                    }
                    Transition::Advance => {
                        let attrs = attrs.with_status("continue").with_duration_ms(timer.elapsed_ms());
                        ctx.try_emit_event(STAGE_COMPLETED, Some(attrs.to_event_data()));
                        break;
                    }
                    Transition::Succeed(outcome) => {
                        let attrs = attrs
                            .with_status("succeeded")
                            .with_duration_ms(timer.elapsed_ms());
                        ctx.try_emit_event(STAGE_COMPLETED, Some(attrs.to_event_data()));
                        return (RunState::Succeeded, outcome);
                    }
                    Transition::Fail(outcome) => {
                        let attrs = attrs
                            .with_status("failed")
                            .with_code(outcome.code)
                            .with_duration_ms(timer.elapsed_ms());
                        ctx.try_emit_event(STAGE_COMPLETED, Some(attrs.to_event_data()));
                        debug!(stage = stage.name(), code = outcome.code, "stage failed the run");
                        return (RunState::Failed, outcome);
                    }
                }
            }
        }

        let outcome = match ctx.take_response() {
            Some(payload) => Outcome::generic_success().with_data(payload),
            None => Outcome::generic_success(),
        };
        (RunState::Succeeded, outcome)
    }

    /// Resolves a pending result, bounded by the configured timeout and raced
    /// against cancellation.
    async fn settle(
        &self,
        stage: &str,
        future: PendingResult,
        token: &CancellationToken,
    ) -> Result<StageResult, FernError> {
        let guarded = AssertUnwindSafe(future).catch_unwind();
        let bounded = async {
            let caught = match self.config.pending_timeout() {
                Some(limit) => tokio::time::timeout(limit, guarded)
                    .await
                    .map_err(|_| FernError::Timeout {
                        stage: stage.to_string(),
                        timeout_ms: self.config.pending_timeout_ms.unwrap_or_default(),
                    })?,
                None => guarded.await,
            };
            caught.map_err(|panic| FernError::Panicked {
                stage: stage.to_string(),
                message: panic_message(panic.as_ref()),
            })
        };

        tokio::select! {
            result = bounded => result,
            () = token.cancelled() => Err(FernError::Cancelled(token.reason().unwrap_or_default())),
        }
    }

    fn stage_failure(&self, stage: &str, err: &FernError) -> Outcome {
        match err {
            FernError::Cancelled(_) | FernError::Timeout { .. } => {
                warn!(stage, error = %err, "stage did not finish");
            }
            _ => error!(stage, error = %err, "stage raised an error"),
        }
        err.to_outcome(&self.config.failure_prefix)
    }
}

/// Calls a stage, turning a panic into an error.
async fn invoke(stage: &dyn Stage, ctx: &mut RequestContext) -> Result<StageResult, FernError> {
    match AssertUnwindSafe(stage.execute(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(FernError::Panicked {
            stage: stage.name().to_string(),
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RawRequest;
    use crate::core::{Method, RouteKey};
    use crate::emitter::RecordingResponder;
    use crate::events::CollectingEventSink;
    use crate::stages::{FnStage, NoOpStage};
    use crate::testing::{FailingStage, PanickingStage, PendingStage, RecordingStage};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn ctx() -> RequestContext {
        RequestContext::new(RouteKey::http(Method::Post, "/login"), RawRequest::new())
    }

    fn stages(list: Vec<Arc<dyn Stage>>) -> Vec<Arc<dyn Stage>> {
        list
    }

    #[tokio::test]
    async fn test_all_continue_succeeds_with_generic_payload() {
        let pipeline = stages(vec![Arc::new(NoOpStage::new("a")), Arc::new(NoOpStage::new("b"))]);
        let responder = RecordingResponder::new();

        let report = Executor::default().execute(&pipeline, &mut ctx(), &responder).await;

        assert_eq!(report.state, RunState::Succeeded);
        assert_eq!(report.stages_run, 2);
        assert_eq!(responder.len(), 1);
        assert_eq!(
            responder.last().unwrap().payload,
            json!({"message": "OK", "status": 200})
        );
    }

    #[tokio::test]
    async fn test_failure_stops_the_run() {
        let after = Arc::new(RecordingStage::new("after"));
        let pipeline = stages(vec![
            Arc::new(NoOpStage::new("a")),
            Arc::new(FnStage::new("deny", |_: &mut RequestContext| {
                StageResult::done(401, "Unauthorized")
            })),
            after.clone(),
        ]);
        let responder = RecordingResponder::new();

        let report = Executor::default().execute(&pipeline, &mut ctx(), &responder).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.outcome, Outcome::new(401, "Unauthorized"));
        assert_eq!(report.stages_run, 2);
        assert_eq!(after.calls(), 0);
        assert_eq!(responder.len(), 1);
    }

    #[tokio::test]
    async fn test_done_200_succeeds_early() {
        let after = Arc::new(RecordingStage::new("after"));
        let pipeline = stages(vec![
            Arc::new(FnStage::new("ok", |_: &mut RequestContext| {
                Outcome::ok("Logged in").into()
            })),
            after.clone(),
        ]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert!(report.is_success());
        assert_eq!(report.outcome.message, "Logged in");
        assert_eq!(after.calls(), 0);
    }

    #[tokio::test]
    async fn test_declined_is_generic_failure() {
        let pipeline = stages(vec![Arc::new(FnStage::new("no", |_: &mut RequestContext| {
            StageResult::Declined
        }))]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert_eq!(report.outcome, Outcome::new(500, "FernError: Function failed"));
    }

    #[tokio::test]
    async fn test_socket_prefix() {
        let pipeline = stages(vec![Arc::new(FnStage::new("no", |_: &mut RequestContext| {
            StageResult::Declined
        }))]);

        let report = Executor::new(ExecutorConfig::socket())
            .run(&pipeline, &mut ctx())
            .await;
        assert_eq!(report.outcome.message, "SocketError: Function failed");
    }

    #[tokio::test]
    async fn test_stage_error_carries_cause() {
        let pipeline = stages(vec![Arc::new(FailingStage::new("boom", "disk on fire"))]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert_eq!(report.outcome.code, 500);
        assert_eq!(report.outcome.message, "FernError: Function failed");
        assert!(report.outcome.cause.unwrap().contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let pipeline = stages(vec![Arc::new(PanickingStage::new("explode"))]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert_eq!(report.state, RunState::Failed);
        assert!(report.outcome.cause.unwrap().contains("explode"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_invalid_implementation() {
        let responder = RecordingResponder::new();
        let report = Executor::default().execute(&[], &mut ctx(), &responder).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.outcome.code, 500);
        assert_eq!(report.outcome.message, INVALID_IMPLEMENTATION);
        assert_eq!(report.stages_run, 0);
        assert_eq!(responder.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_resolves_in_order() {
        let pipeline = stages(vec![
            Arc::new(FnStage::new("write", |ctx: &mut RequestContext| {
                ctx.store_mut().insert("step".into(), json!(1));
                StageResult::pending(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    StageResult::Continue
                })
            })),
            Arc::new(FnStage::new("read", |ctx: &mut RequestContext| {
                (ctx.store()["step"] == json!(1)).into()
            })),
        ]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert!(report.is_success());
        assert_eq!(report.stages_run, 2);
    }

    #[tokio::test]
    async fn test_nested_pending_resolves_at_same_index() {
        let pipeline = stages(vec![Arc::new(FnStage::new("twice", |_: &mut RequestContext| {
            StageResult::pending(async {
                StageResult::pending(async { StageResult::done(418, "Teapot") })
            })
        }))]);

        let report = Executor::default().run(&pipeline, &mut ctx()).await;
        assert_eq!(report.outcome.code, 418);
        assert_eq!(report.stages_run, 1);
    }

    #[tokio::test]
    async fn test_pending_timeout() {
        let pipeline = stages(vec![Arc::new(PendingStage::new("slow", Duration::from_secs(5)))]);
        let executor =
            Executor::new(ExecutorConfig::new().with_pending_timeout(Duration::from_millis(20)));

        let report = executor.run(&pipeline, &mut ctx()).await;
        assert_eq!(report.outcome.code, 504);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel("client went away");
        let first = Arc::new(RecordingStage::new("first"));
        let pipeline = stages(vec![first.clone()]);
        let mut ctx = ctx().with_cancellation(token);

        let report = Executor::default().run(&pipeline, &mut ctx).await;
        assert_eq!(report.outcome.code, 503);
        assert_eq!(report.outcome.cause.as_deref(), Some("client went away"));
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_suspended() {
        let token = CancellationToken::new();
        let pipeline = stages(vec![Arc::new(PendingStage::new("slow", Duration::from_secs(5)))]);
        let mut ctx = ctx().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("shutdown");
        });
        let report = Executor::default().run(&pipeline, &mut ctx).await;
        canceller.await.unwrap();

        assert_eq!(report.outcome.code, 503);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = stages(vec![Arc::new(NoOpStage::new("a")), Arc::new(NoOpStage::new("b"))]);
        let mut ctx = ctx().with_event_sink(sink.clone());

        Executor::default().run(&pipeline, &mut ctx).await;

        assert_eq!(
            sink.event_types(),
            vec![RUN_STARTED, STAGE_COMPLETED, STAGE_COMPLETED, RUN_SUCCEEDED]
        );
    }

    #[tokio::test]
    async fn test_staged_response_is_success_payload() {
        let pipeline = stages(vec![Arc::new(FnStage::new("send", |ctx: &mut RequestContext| {
            ctx.stage_response(json!({"token": "abc"}));
            StageResult::Continue
        }))]);
        let responder = RecordingResponder::new();

        Executor::default().execute(&pipeline, &mut ctx(), &responder).await;
        assert_eq!(
            responder.last().unwrap().payload,
            json!({"token": "abc", "status": 200})
        );
    }
}
