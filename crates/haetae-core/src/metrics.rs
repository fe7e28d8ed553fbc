//! Binary classification metrics
//!
//! Shared by the evaluation harness and the trainer's per-epoch validation.
//! `Hate` is the positive class throughout, and metrics whose denominator is
//! zero are defined as 0 rather than NaN (zero-division-as-zero semantics).

use crate::{Error, Label, MetricReport, Result};

/// Compute the metric suite over index-aligned truth/prediction sequences.
pub fn binary_report(truth: &[Label], predicted: &[Label]) -> Result<MetricReport> {
    if truth.len() != predicted.len() {
        return Err(Error::backend(format!(
            "metric inputs are misaligned: {} true labels vs {} predictions",
            truth.len(),
            predicted.len()
        )));
    }

    let mut true_positive = 0usize;
    let mut false_positive = 0usize;
    let mut false_negative = 0usize;
    let mut correct = 0usize;

    for (t, p) in truth.iter().zip(predicted) {
        if t == p {
            correct += 1;
        }
        match (t.is_hate(), p.is_hate()) {
            (true, true) => true_positive += 1,
            (false, true) => false_positive += 1,
            (true, false) => false_negative += 1,
            (false, false) => {}
        }
    }

    let sample_count = truth.len();
    let accuracy = safe_div(correct, sample_count);
    let precision = safe_div(true_positive, true_positive + false_positive);
    let recall = safe_div(true_positive, true_positive + false_negative);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(MetricReport {
        accuracy,
        precision,
        recall,
        f1,
        sample_count,
    })
}

fn safe_div(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
