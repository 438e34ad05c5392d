//! Cooperative cancellation for pipeline runs.
//!
//! The executor checks the token before every stage and races suspended
//! stages against it.

mod token;

pub use token::CancellationToken;
