//! Testing utilities for fern pipelines.
//!
//! This module provides:
//! - Mock stages (recording, failing, panicking, pending)
//! - Assertions over run reports and emissions

mod assertions;
mod mocks;

pub use assertions::{
    assert_emitted_code, assert_outcome, assert_run_failed, assert_run_succeeded,
    assert_single_emission,
};
pub use mocks::{
    FailingStage, MockStage, PanickingStage, PendingStage, RecordedExecution, RecordingStage,
};
