//! Run lifecycle events.
//!
//! The executor reports each run through an [`EventSink`]: one
//! `run.started`, one `stage.completed` per executed stage, and exactly one
//! of `run.succeeded` / `run.failed`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

/// Emitted when a context is bound to a pipeline.
pub const RUN_STARTED: &str = "run.started";
/// Emitted after every stage result is resolved.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted when the run ends in the succeeded state.
pub const RUN_SUCCEEDED: &str = "run.succeeded";
/// Emitted when the run ends in the failed state.
pub const RUN_FAILED: &str = "run.failed";

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide event sink new contexts pick up.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the process-wide event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
