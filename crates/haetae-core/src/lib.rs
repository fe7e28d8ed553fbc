//! Haetae Core
//!
//! Shared types and error handling for the Haetae hate-speech detection and
//! benchmarking suite: the canonical `Example` record, binary `Label`,
//! classification `Verdict`, the `MetricReport` produced by the evaluation
//! harness, and the workspace-wide `Error` taxonomy.

pub mod error;
pub mod metrics;
pub mod types;

pub use error::{Error, Result};
pub use types::{Example, Label, MetricReport, RawAnnotation, SplitRatios, Verdict};
