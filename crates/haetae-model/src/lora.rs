//! LoRA (Low-Rank Adaptation) layers
//!
//! For a frozen projection W ∈ ℝ^(d_out × d_in), LoRA adds a trainable
//! low-rank delta: y = Wx + (α/r) · B(A x), with A ∈ ℝ^(r × d_in) drawn from
//! a small Gaussian and B ∈ ℝ^(d_out × r) zero-initialized so the delta is
//! exactly zero before training. The base weight is never mutated; the
//! composition is additive at forward time.

use candle_core::{Result as CandleResult, Tensor};
use candle_nn::{Dropout, Init, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bias-training mode; only `"none"` is supported
pub const BIAS_NONE: &str = "none";

fn default_targets() -> BTreeSet<String> {
    ["query", "value"].iter().map(|s| s.to_string()).collect()
}

/// LoRA hyperparameters, recorded verbatim in the adapter artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Rank of the low-rank decomposition
    pub rank: usize,

    /// Scaling numerator; the applied scale is `alpha / rank`
    pub alpha: f64,

    /// Dropout probability on the delta path during training
    pub dropout: f32,

    /// Names of the attention projections the adapter attaches to
    #[serde(default = "default_targets")]
    pub target_modules: BTreeSet<String>,

    /// Bias-training mode (`"none"` only)
    #[serde(default = "LoraConfig::default_bias")]
    pub bias: String,
}

impl LoraConfig {
    fn default_bias() -> String {
        BIAS_NONE.to_string()
    }

    /// Scale factor applied to the delta output
    pub fn scaling(&self) -> f64 {
        self.alpha / self.rank as f64
    }

    /// Reject configurations this implementation cannot honor
    pub fn validate(&self) -> haetae_core::Result<()> {
        if self.rank == 0 {
            return Err(haetae_core::Error::config("LoRA rank must be non-zero"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(haetae_core::Error::config(format!(
                "LoRA dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.target_modules.is_empty() {
            return Err(haetae_core::Error::config(
                "LoRA target module set is empty",
            ));
        }
        if self.bias != BIAS_NONE {
            return Err(haetae_core::Error::config(format!(
                "unsupported LoRA bias mode {:?}",
                self.bias
            )));
        }
        Ok(())
    }
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            rank: 8,
            alpha: 16.0,
            dropout: 0.1,
            target_modules: default_targets(),
            bias: Self::default_bias(),
        }
    }
}

/// Trainable low-rank delta for one projection
#[derive(Debug, Clone)]
pub struct LoraDelta {
    /// Down-projection A, shape `[rank, d_in]`
    down: Tensor,
    /// Up-projection B, shape `[d_out, rank]`
    up: Tensor,
    scale: f64,
    dropout: Dropout,
}

impl LoraDelta {
    /// Tensor name of the down-projection inside an adapter checkpoint
    pub const DOWN_NAME: &'static str = "lora_a.weight";
    /// Tensor name of the up-projection inside an adapter checkpoint
    pub const UP_NAME: &'static str = "lora_b.weight";

    /// Create (or fetch, when the builder is tensor-backed) the delta pair
    /// for a projection of shape `[d_out, d_in]`.
    pub fn new(
        vb: &VarBuilder,
        d_out: usize,
        d_in: usize,
        config: &LoraConfig,
    ) -> CandleResult<Self> {
        let down = vb.get_with_hints(
            (config.rank, d_in),
            Self::DOWN_NAME,
            Init::Randn {
                mean: 0.0,
                stdev: 0.02,
            },
        )?;
        let up = vb.get_with_hints((d_out, config.rank), Self::UP_NAME, Init::Const(0.0))?;

        Ok(Self {
            down,
            up,
            scale: config.scaling(),
            dropout: Dropout::new(config.dropout),
        })
    }

    /// Delta output: `(α/r) · B(dropout(A x))`
    fn forward(&self, xs: &Tensor, train: bool) -> CandleResult<Tensor> {
        let hidden = xs.broadcast_matmul(&self.down.t()?)?;
        let hidden = self.dropout.forward(&hidden, train)?;
        let hidden = hidden.broadcast_matmul(&self.up.t()?)?;
        hidden * self.scale
    }
}

/// A linear projection with an optional LoRA delta.
///
/// The base weights stay frozen; attaching a delta changes nothing until
/// its parameters move away from the zero initialization.
#[derive(Debug, Clone)]
pub struct LoraLinear {
    base: Linear,
    delta: Option<LoraDelta>,
}

impl LoraLinear {
    /// Wrap a frozen linear projection without a delta
    pub fn frozen(base: Linear) -> Self {
        Self { base, delta: None }
    }

    /// Attach a delta, replacing any previous one
    pub fn attach(&mut self, delta: LoraDelta) {
        self.delta = Some(delta);
    }

    /// Whether a delta is currently attached
    pub fn has_delta(&self) -> bool {
        self.delta.is_some()
    }

    /// Forward pass; `train` only controls delta dropout
    pub fn forward(&self, xs: &Tensor, train: bool) -> CandleResult<Tensor> {
        let base = self.base.forward(xs)?;
        match &self.delta {
            None => Ok(base),
            Some(delta) => base + delta.forward(xs, train)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn test_linear(d_out: usize, d_in: usize, device: &Device) -> Linear {
        let weight = Tensor::rand(-0.5f32, 0.5, (d_out, d_in), device).unwrap();
        Linear::new(weight, None)
    }

    #[test]
    fn test_delta_is_zero_at_init() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let base = test_linear(6, 4, &device);
        let mut layer = LoraLinear::frozen(base.clone());

        let x = Tensor::rand(-1f32, 1.0, (2, 3, 4), &device).unwrap();
        let before = layer.forward(&x, false).unwrap();

        let config = LoraConfig::default();
        let delta = LoraDelta::new(&vb, 6, 4, &config).unwrap();
        layer.attach(delta);
        assert!(layer.has_delta());

        // B is zero-initialized, so the composed output equals the frozen one
        let after = layer.forward(&x, false).unwrap();
        let diff = (before - after)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-6, "delta changed output at init: {diff}");
    }

    #[test]
    fn test_nonzero_delta_changes_output() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let mut layer = LoraLinear::frozen(test_linear(4, 4, &device));
        let config = LoraConfig {
            dropout: 0.0,
            ..Default::default()
        };
        layer.attach(LoraDelta::new(&vb, 4, 4, &config).unwrap());

        // Push B away from zero so the delta path contributes
        {
            let data = varmap.data().lock().unwrap();
            let up = data.get(LoraDelta::UP_NAME).unwrap();
            let ones = Tensor::ones(up.shape(), DType::F32, &device).unwrap();
            up.set(&ones).unwrap();
        }

        let x = Tensor::rand(-1f32, 1.0, (1, 2, 4), &device).unwrap();
        let plain = layer.base.forward(&x).unwrap();
        let composed = layer.forward(&x, false).unwrap();
        let diff = (plain - composed)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff > 1e-4, "delta had no effect: {diff}");
    }

    #[test]
    fn test_config_defaults_match_training_recipe() {
        let config = LoraConfig::default();
        assert_eq!(config.rank, 8);
        assert_eq!(config.alpha, 16.0);
        assert!((config.scaling() - 2.0).abs() < 1e-12);
        assert!(config.target_modules.contains("query"));
        assert!(config.target_modules.contains("value"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoraConfig::default();
        config.rank = 0;
        assert!(config.validate().is_err());

        let mut config = LoraConfig::default();
        config.bias = "all".to_string();
        assert!(config.validate().is_err());

        let mut config = LoraConfig::default();
        config.target_modules.clear();
        assert!(config.validate().is_err());
    }
}
