//! Frozen backbone handle
//!
//! A BERT/ELECTRA-style sequence-classification encoder built on candle.
//! Base weights are loaded as plain tensors and never registered with a
//! trainable parameter store, so nothing in the training loop can mutate
//! them. The attention query/value projections are [`LoraLinear`] so an
//! adapter delta can be attached after loading; the two-way classification
//! head is part of the adapter side and only exists once one is attached.

use crate::config::{BackboneConfig, BackboneFiles};
use crate::lora::{LoraConfig, LoraDelta, LoraLinear};
use candle_core::{DType, Device, Result as CandleResult, Tensor};
use candle_nn::ops::softmax_last_dim;
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, Module, VarBuilder};
use haetae_core::{Error, Result};
use std::collections::HashMap;

/// Number of output classes; the suite is strictly binary
pub const NUM_LABELS: usize = 2;

struct Embeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: &VarBuilder, config: &BackboneConfig) -> CandleResult<Self> {
        let hidden = config.hidden_size;
        Ok(Self {
            word: embedding(config.vocab_size, hidden, vb.pp("word_embeddings"))?,
            position: embedding(
                config.max_position_embeddings,
                hidden,
                vb.pp("position_embeddings"),
            )?,
            token_type: embedding(
                config.type_vocab_size,
                hidden,
                vb.pp("token_type_embeddings"),
            )?,
            norm: layer_norm(hidden, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;

        let words = self.word.forward(input_ids)?;
        let position_ids =
            Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;
        let positions = self.position.forward(&position_ids)?;
        let token_types = self.token_type.forward(&input_ids.zeros_like()?)?;

        let sum = (words.broadcast_add(&positions)? + token_types)?;
        self.norm.forward(&sum)
    }
}

struct EncoderLayer {
    query: LoraLinear,
    key: Linear,
    value: LoraLinear,
    attn_output: Linear,
    attn_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl EncoderLayer {
    fn load(vb: &VarBuilder, config: &BackboneConfig) -> CandleResult<Self> {
        let hidden = config.hidden_size;
        let attn = vb.pp("attention");
        Ok(Self {
            query: LoraLinear::frozen(linear(hidden, hidden, attn.pp("self.query"))?),
            key: linear(hidden, hidden, attn.pp("self.key"))?,
            value: LoraLinear::frozen(linear(hidden, hidden, attn.pp("self.value"))?),
            attn_output: linear(hidden, hidden, attn.pp("output.dense"))?,
            attn_norm: layer_norm(hidden, config.layer_norm_eps, attn.pp("output.LayerNorm"))?,
            intermediate: linear(hidden, config.intermediate_size, vb.pp("intermediate.dense"))?,
            output: linear(config.intermediate_size, hidden, vb.pp("output.dense"))?,
            output_norm: layer_norm(hidden, config.layer_norm_eps, vb.pp("output.LayerNorm"))?,
            num_heads: config.num_attention_heads,
            head_dim: config.head_dim(),
        })
    }

    fn forward(&self, hidden: &Tensor, mask: &Tensor, train: bool) -> CandleResult<Tensor> {
        let (batch, seq_len, width) = hidden.dims3()?;

        let split_heads = |t: Tensor| -> CandleResult<Tensor> {
            t.reshape((batch, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split_heads(self.query.forward(hidden, train)?)?;
        let k = split_heads(self.key.forward(hidden)?)?;
        let v = split_heads(self.value.forward(hidden, train)?)?;

        let scores = (q.matmul(&k.transpose(2, 3)?.contiguous()?)?
            * (1.0 / (self.head_dim as f64).sqrt()))?;
        let scores = scores.broadcast_add(mask)?;
        let probs = softmax_last_dim(&scores)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, width))?;
        let attended = self
            .attn_norm
            .forward(&(self.attn_output.forward(&context)? + hidden)?)?;

        let ffn = self
            .output
            .forward(&self.intermediate.forward(&attended)?.gelu_erf()?)?;
        self.output_norm.forward(&(ffn + attended)?)
    }
}

/// Two-way classification head; trained with the adapter, not part of the
/// frozen checkpoint.
struct ClassifierHead {
    pooler: Linear,
    classifier: Linear,
}

impl ClassifierHead {
    fn new(vb: &VarBuilder, hidden: usize) -> CandleResult<Self> {
        Ok(Self {
            pooler: linear(hidden, hidden, vb.pp("pooler.dense"))?,
            classifier: linear(hidden, NUM_LABELS, vb.pp("classifier"))?,
        })
    }

    fn forward(&self, hidden: &Tensor) -> CandleResult<Tensor> {
        // [CLS] position pooling
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        self.classifier.forward(&pooled)
    }
}

/// The frozen pretrained encoder plus optional adapter state
pub struct Backbone {
    id: String,
    config: BackboneConfig,
    device: Device,
    embeddings: Embeddings,
    layers: Vec<EncoderLayer>,
    head: Option<ClassifierHead>,
}

impl Backbone {
    /// Load a backbone from resolved files.
    pub fn load(files: &BackboneFiles, device: &Device) -> Result<Self> {
        let config = BackboneConfig::from_file(&files.config)?;

        let tensors = candle_core::safetensors::load(&files.weights, device)
            .map_err(|e| Error::model(format!("failed to load backbone weights: {e}")))?;
        let tensors: HashMap<String, Tensor> = tensors
            .into_iter()
            .map(|(key, value)| (normalize_key(key), value))
            .collect();
        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);

        let backbone = Self::from_varbuilder(&files.id, config, &vb, device)?;
        tracing::info!(
            backbone = %backbone.id,
            layers = backbone.layers.len(),
            hidden = backbone.config.hidden_size,
            "backbone loaded"
        );
        Ok(backbone)
    }

    /// Build the encoder from an arbitrary variable source. Exposed so tests
    /// can construct tiny randomly-initialized backbones without checkpoint
    /// files.
    pub fn from_varbuilder(
        id: &str,
        config: BackboneConfig,
        vb: &VarBuilder,
        device: &Device,
    ) -> Result<Self> {
        let build = || -> CandleResult<(Embeddings, Vec<EncoderLayer>)> {
            let embeddings = Embeddings::load(&vb.pp("embeddings"), &config)?;
            let mut layers = Vec::with_capacity(config.num_hidden_layers);
            for i in 0..config.num_hidden_layers {
                layers.push(EncoderLayer::load(
                    &vb.pp(format!("encoder.layer.{i}")),
                    &config,
                )?);
            }
            Ok((embeddings, layers))
        };
        let (embeddings, layers) =
            build().map_err(|e| Error::model(format!("failed to build encoder: {e}")))?;

        Ok(Self {
            id: id.to_string(),
            config,
            device: device.clone(),
            embeddings,
            layers,
            head: None,
        })
    }

    /// Backbone identifier adapters are keyed on
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encoder hyperparameters
    pub fn config(&self) -> &BackboneConfig {
        &self.config
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Whether an adapter (and thus a classification head) is attached
    pub fn has_adapters(&self) -> bool {
        self.head.is_some()
    }

    /// Attach LoRA deltas and the classification head.
    ///
    /// The variable builder decides where the parameters come from: a
    /// `VarMap`-backed builder creates fresh trainable parameters, a
    /// tensor-backed builder pulls a trained adapter out of an artifact.
    pub fn attach_adapters(&mut self, config: &LoraConfig, vb: &VarBuilder) -> Result<()> {
        config.validate()?;
        for module in &config.target_modules {
            if module != "query" && module != "value" {
                return Err(Error::config(format!(
                    "unsupported target module {module:?}; this backbone exposes: query, value"
                )));
            }
        }

        let hidden = self.config.hidden_size;
        let mut attach = || -> CandleResult<ClassifierHead> {
            for (i, layer) in self.layers.iter_mut().enumerate() {
                for module in &config.target_modules {
                    let prefix = format!("encoder.layer.{i}.attention.self.{module}");
                    let delta = LoraDelta::new(&vb.pp(prefix), hidden, hidden, config)?;
                    match module.as_str() {
                        "query" => layer.query.attach(delta),
                        _ => layer.value.attach(delta),
                    }
                }
            }
            ClassifierHead::new(vb, hidden)
        };
        let head = attach().map_err(|e| Error::model(format!("failed to attach adapter: {e}")))?;
        self.head = Some(head);

        tracing::debug!(
            backbone = %self.id,
            rank = config.rank,
            targets = ?config.target_modules,
            "adapter attached"
        );
        Ok(())
    }

    /// Forward pass to class logits of shape `[batch, 2]`.
    ///
    /// `train` only enables adapter dropout; the base weights are frozen
    /// either way.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let head = self.head.as_ref().ok_or_else(|| {
            Error::model("no classification head attached; compose an adapter first")
        })?;

        let run = || -> CandleResult<Tensor> {
            // Additive mask: 0 for real tokens, -1e4 for padding
            let mask = attention_mask
                .to_dtype(DType::F32)?
                .affine(1e4, -1e4)?
                .unsqueeze(1)?
                .unsqueeze(1)?;

            let mut hidden = self.embeddings.forward(input_ids)?;
            for layer in &self.layers {
                hidden = layer.forward(&hidden, &mask, train)?;
            }
            head.forward(&hidden)
        };
        run().map_err(|e| Error::model(format!("backbone forward failed: {e}")))
    }
}

/// Strip the architecture prefix Hugging Face exporters put on weight names
fn normalize_key(key: String) -> String {
    for prefix in ["electra.", "bert."] {
        if let Some(stripped) = key.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    key
}
