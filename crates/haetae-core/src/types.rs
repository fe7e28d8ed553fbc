//! Core types for Haetae

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Binary hate-speech label.
///
/// This is the canonical label after normalization: exactly one of two
/// values, never null, never multi-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// No hate speech detected
    Clean,
    /// Hate speech detected
    Hate,
}

impl Label {
    /// Convert to the on-disk/wire integer representation
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Hate => 1,
        }
    }

    /// Parse from the integer representation
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Clean),
            1 => Ok(Self::Hate),
            other => Err(Error::malformed_label(other.to_string(), "binary label")),
        }
    }

    /// Whether this is the positive (hate) class
    pub fn is_hate(self) -> bool {
        matches!(self, Self::Hate)
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Label::from_u8(value).map_err(serde::de::Error::custom)
    }
}

/// A single labeled example in the canonical dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// The text span to classify
    pub text: String,

    /// Canonical binary label
    pub label: Label,
}

impl Example {
    /// Create a new example
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// A raw multi-label annotation as parsed from a source file.
///
/// Consumed once by the label normalizer and then discarded.
#[derive(Debug, Clone)]
pub struct RawAnnotation {
    /// The annotated text
    pub text: String,

    /// Ordered category codes; `"8"` is reserved for "no category"
    pub raw_labels: Vec<String>,
}

/// Result of a single classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The predicted binary label
    pub label: Label,

    /// Probability of the predicted class, when the backend exposes one.
    /// Hosted backends only return a discrete label.
    pub confidence: Option<f32>,
}

impl Verdict {
    /// Create a verdict with a confidence score
    pub fn with_confidence(label: Label, confidence: f32) -> Self {
        Self {
            label,
            confidence: Some(confidence),
        }
    }

    /// Create a verdict without a confidence score
    pub fn bare(label: Label) -> Self {
        Self {
            label,
            confidence: None,
        }
    }

    /// The conservative fallback when a backend cannot produce a valid
    /// parsed verdict.
    pub fn conservative_default() -> Self {
        Self::bare(Label::Clean)
    }
}

/// Metric suite computed once per (backend, test-set) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Fraction of predictions equal to the true label
    pub accuracy: f64,

    /// Precision with `Hate` as the positive class (0 when undefined)
    pub precision: f64,

    /// Recall with `Hate` as the positive class (0 when undefined)
    pub recall: f64,

    /// Harmonic mean of precision and recall (0 when undefined)
    pub f1: f64,

    /// Number of examples the metrics were computed over
    pub sample_count: usize,
}

impl std::fmt::Display for MetricReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "samples:   {}", self.sample_count)?;
        writeln!(f, "accuracy:  {:.4}", self.accuracy)?;
        writeln!(f, "precision: {:.4}", self.precision)?;
        writeln!(f, "recall:    {:.4}", self.recall)?;
        write!(f, "f1:        {:.4}", self.f1)
    }
}

/// Partition ratios for the stratified train/validation/test split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    /// Training fraction of the full dataset
    pub train: f64,
    /// Validation fraction of the full dataset
    pub validation: f64,
    /// Test fraction of the full dataset
    pub test: f64,
}

impl SplitRatios {
    /// Create ratios, validating that they are positive and sum to 1.0
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self> {
        if train <= 0.0 || validation <= 0.0 || test <= 0.0 {
            return Err(Error::config("split ratios must be positive"));
        }
        let sum = train + validation + test;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::config(format!(
                "split ratios must sum to 1.0, got {sum}"
            )));
        }
        Ok(Self {
            train,
            validation,
            test,
        })
    }

    /// Ratio for the second-stage split: validation relative to what remains
    /// after the test partition is removed.
    pub fn validation_of_remainder(&self) -> f64 {
        self.validation / (1.0 - self.test)
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            validation: 0.1,
            test: 0.1,
        }
    }
}
