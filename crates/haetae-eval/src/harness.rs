//! Evaluation harness
//!
//! Runs any [`Backend`] over a labeled example set and scores the
//! verdicts against ground truth. The harness never reorders or
//! mutates the input set; metrics are computed positionally.

use haetae_backends::Backend;
use haetae_core::{metrics, Error, Example, Label, MetricReport, Result};

/// Options controlling one evaluation run
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Score only the first N examples. Useful against hosted backends
    /// where a full pass is slow or costs money.
    pub sample_limit: Option<usize>,
}

/// Score a backend against a labeled example set.
///
/// Verdict confidence is ignored here; only the hard label enters the
/// metric computation.
pub async fn evaluate(
    backend: &dyn Backend,
    examples: &[Example],
    options: &EvalOptions,
) -> Result<MetricReport> {
    let scored = match options.sample_limit {
        Some(limit) => &examples[..limit.min(examples.len())],
        None => examples,
    };
    if scored.is_empty() {
        return Err(Error::insufficient_data("evaluation set is empty"));
    }

    tracing::info!(
        backend = backend.name(),
        samples = scored.len(),
        "starting evaluation"
    );

    let texts: Vec<String> = scored.iter().map(|e| e.text.clone()).collect();
    let verdicts = backend.classify_batch(&texts).await?;
    if verdicts.len() != scored.len() {
        return Err(Error::backend(format!(
            "backend {} returned {} verdicts for {} inputs",
            backend.name(),
            verdicts.len(),
            scored.len()
        )));
    }

    let truth: Vec<Label> = scored.iter().map(|e| e.label).collect();
    let predicted: Vec<Label> = verdicts.iter().map(|v| v.label).collect();
    let report = metrics::binary_report(&truth, &predicted)?;

    tracing::info!(backend = backend.name(), %report, "evaluation complete");
    Ok(report)
}
