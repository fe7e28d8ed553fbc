//! Adapter artifact persistence
//!
//! A trained adapter is a directory holding the delta tensors
//! (`adapter_model.safetensors`) and a JSON record of the LoRA
//! hyperparameters plus the identifier of the backbone it was trained
//! against. Composition verifies that identifier before any tensor is
//! attached, so an adapter can never be silently applied to the wrong
//! backbone.

use crate::backbone::Backbone;
use crate::lora::LoraConfig;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use haetae_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// File name of the hyperparameter/provenance record
pub const CONFIG_FILE: &str = "adapter_config.json";
/// File name of the delta tensor checkpoint
pub const WEIGHTS_FILE: &str = "adapter_model.safetensors";

/// On-disk adapter metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Identifier of the backbone this adapter composes with
    pub backbone_id: String,

    /// LoRA hyperparameters used at training time
    #[serde(flatten)]
    pub lora: LoraConfig,
}

/// A trained adapter loaded into memory
pub struct AdapterArtifact {
    config: AdapterConfig,
    tensors: HashMap<String, Tensor>,
}

impl AdapterArtifact {
    /// Persist adapter tensors and metadata into `dir` (created if absent).
    pub fn save(
        dir: &Path,
        backbone_id: &str,
        lora: &LoraConfig,
        tensors: &HashMap<String, Tensor>,
    ) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let config = AdapterConfig {
            backbone_id: backbone_id.to_string(),
            lora: lora.clone(),
        };
        let config_json = serde_json::to_string_pretty(&config)?;
        std::fs::write(dir.join(CONFIG_FILE), config_json)?;

        candle_core::safetensors::save(tensors, dir.join(WEIGHTS_FILE))
            .map_err(|e| Error::model(format!("failed to save adapter tensors: {e}")))?;

        tracing::info!(
            dir = %dir.display(),
            backbone = %backbone_id,
            tensors = tensors.len(),
            "adapter artifact saved"
        );
        Ok(())
    }

    /// Load an artifact directory into memory.
    pub fn load(dir: &Path, device: &Device) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::config(format!(
                "adapter artifact not found at {}",
                dir.display()
            )));
        }

        let config: AdapterConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        config.lora.validate()?;

        let tensors = candle_core::safetensors::load(dir.join(WEIGHTS_FILE), device)
            .map_err(|e| Error::model(format!("failed to load adapter tensors: {e}")))?;

        Ok(Self { config, tensors })
    }

    /// Metadata recorded at training time
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Attach this adapter to a backbone, verifying the identifier first.
    pub fn compose(&self, backbone: &mut Backbone) -> Result<()> {
        if self.config.backbone_id != backbone.id() {
            return Err(Error::BackboneMismatch {
                expected: self.config.backbone_id.clone(),
                actual: backbone.id().to_string(),
            });
        }

        let vb = VarBuilder::from_tensors(self.tensors.clone(), DType::F32, backbone.device());
        backbone.attach_adapters(&self.config.lora, &vb)
    }
}
