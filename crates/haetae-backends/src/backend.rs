//! Classification backend contract

use async_trait::async_trait;
use haetae_core::{Result, Verdict};

/// Uniform contract over all classification backends.
///
/// `classify_batch` is semantically equivalent to repeated single calls:
/// implementations may pipeline internally, but per-item independence and
/// input order are preserved. Backends hold no per-call mutable state, so a
/// shared reference may be used concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Classify a single text span
    async fn classify(&self, text: &str) -> Result<Verdict>;

    /// Classify a batch of texts, one verdict per input, in input order
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::with_capacity(texts.len());
        for text in texts {
            verdicts.push(self.classify(text).await?);
        }
        Ok(verdicts)
    }

    /// Short backend identifier used in logs and reports
    fn name(&self) -> &str;
}
