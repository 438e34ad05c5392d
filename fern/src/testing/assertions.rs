//! Test assertions for run reports and emissions.

use crate::core::RunState;
use crate::emitter::{Emission, RecordingResponder};
use crate::pipeline::RunReport;

/// Asserts that the run succeeded.
pub fn assert_run_succeeded(report: &RunReport) {
    assert!(
        report.state == RunState::Succeeded,
        "Expected success, got state {} with outcome {:?}",
        report.state,
        report.outcome
    );
}

/// Asserts that the run failed.
pub fn assert_run_failed(report: &RunReport) {
    assert!(
        report.state == RunState::Failed,
        "Expected failure, got state {}",
        report.state
    );
}

/// Asserts the terminal outcome's code and message.
pub fn assert_outcome(report: &RunReport, code: u16, message: &str) {
    assert_eq!(
        (report.outcome.code, report.outcome.message.as_str()),
        (code, message),
        "Unexpected outcome {:?}",
        report.outcome
    );
}

/// Asserts that exactly one emission happened and returns it.
pub fn assert_single_emission(responder: &RecordingResponder) -> Emission {
    let emissions = responder.emissions();
    assert_eq!(
        emissions.len(),
        1,
        "Expected exactly one emission, got {emissions:?}"
    );
    emissions[0].clone()
}

/// Asserts that exactly one emission happened, with this code.
pub fn assert_emitted_code(responder: &RecordingResponder, code: u16) {
    let emission = assert_single_emission(responder);
    assert_eq!(
        emission.code, code,
        "Expected emission code {code}, got {:?}",
        emission
    );
}
