//! Backend-agnostic evaluation
//!
//! Scores any [`haetae_backends::Backend`] against a labeled test
//! partition, producing the standard binary metric report.

mod harness;

pub use harness::{evaluate, EvalOptions};
