//! Core domain model types for fern.
//!
//! This module contains the fundamental types used throughout the framework:
//! - Route keys and HTTP methods
//! - The stage result protocol and terminal outcomes
//! - The executor's run state machine

mod outcome;
#[cfg(test)]
mod outcome_tests;
mod result;
mod route;
mod status;

pub use outcome::Outcome;
pub use result::{resolve, PendingResult, StageResult, Transition};
pub use route::{Method, RouteKey};
pub use status::RunState;
