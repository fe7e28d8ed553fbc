//! Local adapter backend
//!
//! Runs the frozen backbone composed with a trained adapter. Deterministic
//! for fixed weights and tokenization, no network dependency, and the only
//! degenerate input — an empty string — short-circuits to a clean verdict
//! since an empty string cannot contain hate speech.

use crate::backend::Backend;
use async_trait::async_trait;
use candle_nn::ops::softmax_last_dim;
use haetae_core::{Error, Label, Result, Verdict};
use haetae_model::{AdapterArtifact, Backbone, BackboneFiles, TextEncoder};
use std::path::Path;

/// Internal forward-pass batch size for `classify_batch`
const INFERENCE_BATCH: usize = 32;

/// Locally-hosted backbone+adapter backend
pub struct LocalAdapterBackend {
    backbone: Backbone,
    encoder: TextEncoder,
    name: String,
}

impl std::fmt::Debug for LocalAdapterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAdapterBackend")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl LocalAdapterBackend {
    /// Wrap an already-composed backbone. Fails if no adapter is attached,
    /// so a half-assembled model can never serve predictions.
    pub fn new(backbone: Backbone, encoder: TextEncoder) -> Result<Self> {
        if !backbone.has_adapters() {
            return Err(Error::model(
                "backbone has no adapter composed; load an adapter artifact first",
            ));
        }
        let name = format!("local:{}", backbone.id());
        Ok(Self {
            backbone,
            encoder,
            name,
        })
    }

    /// Load backbone files and an adapter artifact and compose them.
    pub fn compose(
        files: &BackboneFiles,
        adapter_dir: &Path,
        max_seq_len: usize,
        device: &candle_core::Device,
    ) -> Result<Self> {
        let mut backbone = Backbone::load(files, device)?;
        let artifact = AdapterArtifact::load(adapter_dir, device)?;
        artifact.compose(&mut backbone)?;

        let encoder = TextEncoder::from_file(&files.tokenizer, max_seq_len, device)?;
        Self::new(backbone, encoder)
    }

    /// Two-way probability distribution `(clean, hate)` for one text
    pub fn probabilities(&self, text: &str) -> Result<(f32, f32)> {
        if text.trim().is_empty() {
            return Ok((1.0, 0.0));
        }
        let batch = self.probabilities_batch(&[text])?;
        Ok(batch[0])
    }

    /// Softmax-normalized class probabilities for a non-empty batch
    fn probabilities_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<(f32, f32)>> {
        let (input_ids, attention_mask) = self.encoder.encode_batch(texts)?;
        let logits = self.backbone.forward(&input_ids, &attention_mask, false)?;
        let probs = softmax_last_dim(&logits)
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(|e| Error::model(format!("probability normalization failed: {e}")))?;

        probs
            .into_iter()
            .map(|row| match row.as_slice() {
                [clean, hate] => Ok((*clean, *hate)),
                other => Err(Error::model(format!(
                    "expected 2 class probabilities, got {}",
                    other.len()
                ))),
            })
            .collect()
    }

    fn verdict_from_probs((clean, hate): (f32, f32)) -> Verdict {
        if hate > clean {
            Verdict::with_confidence(Label::Hate, hate)
        } else {
            Verdict::with_confidence(Label::Clean, clean)
        }
    }
}

#[async_trait]
impl Backend for LocalAdapterBackend {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        if text.trim().is_empty() {
            // Minimum-confidence clean verdict rather than an error
            return Ok(Verdict::with_confidence(Label::Clean, 0.5));
        }
        let probs = self.probabilities(text)?;
        Ok(Self::verdict_from_probs(probs))
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Verdict>> {
        let mut verdicts: Vec<Option<Verdict>> = vec![None; texts.len()];

        // Empty inputs bypass the model; the rest run as padded forward
        // passes, order preserved via index bookkeeping.
        let mut pending: Vec<(usize, &str)> = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                verdicts[index] = Some(Verdict::with_confidence(Label::Clean, 0.5));
            } else {
                pending.push((index, text.as_str()));
            }
        }

        for chunk in pending.chunks(INFERENCE_BATCH) {
            let chunk_texts: Vec<&str> = chunk.iter().map(|(_, t)| *t).collect();
            let probs = self.probabilities_batch(&chunk_texts)?;
            for ((index, _), p) in chunk.iter().zip(probs) {
                verdicts[*index] = Some(Self::verdict_from_probs(p));
            }
        }

        Ok(verdicts.into_iter().flatten().collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
