//! Text encoding for the backbone
//!
//! Wraps a `tokenizers` tokenizer and turns a batch of texts into padded
//! `input_ids`/`attention_mask` tensors. Padding is done per batch to the
//! longest member, capped at the configured maximum sequence length.

use candle_core::{Device, Tensor};
use haetae_core::{Error, Result};
use std::path::Path;
use tokenizers::Tokenizer;

/// Tokenizer handle scoped to one backbone
pub struct TextEncoder {
    tokenizer: Tokenizer,
    max_seq_len: usize,
    device: Device,
}

impl TextEncoder {
    /// Load a tokenizer from a `tokenizer.json` file
    pub fn from_file(path: &Path, max_seq_len: usize, device: &Device) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| Error::model(format!("failed to load tokenizer: {e}")))?;
        Ok(Self::new(tokenizer, max_seq_len, device))
    }

    /// Wrap an already-constructed tokenizer
    pub fn new(tokenizer: Tokenizer, max_seq_len: usize, device: &Device) -> Self {
        Self {
            tokenizer,
            max_seq_len,
            device: device.clone(),
        }
    }

    /// Encode a batch into `(input_ids, attention_mask)`, both `[batch, len]`.
    pub fn encode_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<(Tensor, Tensor)> {
        if texts.is_empty() {
            return Err(Error::model("cannot encode an empty batch"));
        }

        let mut sequences = Vec::with_capacity(texts.len());
        let mut batch_len = 1usize;
        for text in texts {
            let encoding = self
                .tokenizer
                .encode(text.as_ref(), true)
                .map_err(|e| Error::model(format!("tokenization failed: {e}")))?;
            let mut ids = encoding.get_ids().to_vec();
            ids.truncate(self.max_seq_len);
            batch_len = batch_len.max(ids.len());
            sequences.push(ids);
        }

        let batch = sequences.len();
        let mut input_ids = Vec::with_capacity(batch * batch_len);
        let mut attention_mask = Vec::with_capacity(batch * batch_len);
        for ids in &sequences {
            input_ids.extend_from_slice(ids);
            input_ids.extend(std::iter::repeat(0u32).take(batch_len - ids.len()));
            attention_mask.extend(std::iter::repeat(1u32).take(ids.len()));
            attention_mask.extend(std::iter::repeat(0u32).take(batch_len - ids.len()));
        }

        let make = |data: Vec<u32>| {
            Tensor::from_vec(data, (batch, batch_len), &self.device)
                .map_err(|e| Error::model(format!("failed to build batch tensor: {e}")))
        };
        Ok((make(input_ids)?, make(attention_mask)?))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;

    /// A tiny whitespace word-level tokenizer for tests
    pub fn tiny_encoder(max_seq_len: usize) -> TextEncoder {
        let mut vocab = HashMap::new();
        vocab.insert("[UNK]".to_string(), 0u32);
        for (i, word) in ["hello", "world", "this", "is", "a", "test", "bad", "good"]
            .iter()
            .enumerate()
        {
            vocab.insert(word.to_string(), (i + 1) as u32);
        }

        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Some(tokenizers::pre_tokenizers::whitespace::Whitespace {}));

        TextEncoder::new(tokenizer, max_seq_len, &Device::Cpu)
    }
}
