//! Route registration and pipeline execution.
//!
//! This module provides:
//! - The registry and its fluent route builder
//! - The sequential executor and its run report
//! - The frozen dispatcher transport adapters call into

mod builder;
mod dispatcher;
mod executor;

pub use builder::{Registry, RouteBuilder, StageList};
pub use dispatcher::Dispatcher;
pub use executor::{Executor, RunReport};
