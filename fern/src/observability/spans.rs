//! Span attributes and timing for pipeline runs.

use crate::context::RequestContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Attributes describing one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Run ID.
    pub run_id: String,
    /// Route key (`post:/login`, `event:chat`).
    pub route: String,
    /// Number of stages in the pipeline.
    pub stage_count: usize,
    /// Client address, when known.
    pub client_ip: Option<String>,
}

impl RunSpanAttributes {
    /// Captures the attributes of a context about to run.
    #[must_use]
    pub fn from_context(ctx: &RequestContext, stage_count: usize) -> Self {
        Self {
            run_id: ctx.run_id().to_string(),
            route: ctx.route().to_string(),
            stage_count,
            client_ip: ctx.request().client_ip(),
        }
    }

    /// Converts to flat string attributes.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("run.id".to_string(), self.run_id.clone());
        attrs.insert("run.route".to_string(), self.route.clone());
        attrs.insert("run.stage_count".to_string(), self.stage_count.to_string());
        if let Some(ref ip) = self.client_ip {
            attrs.insert("client.ip".to_string(), ip.clone());
        }
        attrs
    }
}

/// Attributes describing one stage execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// Stage name.
    pub stage_name: String,
    /// Position in the pipeline.
    pub index: usize,
    /// How the result resolved (`continue`, `succeeded`, `failed`).
    pub status: Option<String>,
    /// Duration in milliseconds, pending resolution included.
    pub duration_ms: Option<f64>,
    /// Failure code, if the stage failed the run.
    pub code: Option<u16>,
}

impl StageSpanAttributes {
    /// Creates stage attributes.
    #[must_use]
    pub fn new(stage_name: impl Into<String>, index: usize) -> Self {
        Self {
            stage_name: stage_name.into(),
            index,
            ..Default::default()
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the failure code.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Converts to an event payload.
    #[must_use]
    pub fn to_event_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
