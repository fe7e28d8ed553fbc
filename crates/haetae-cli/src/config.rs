//! Training configuration file

use haetae_model::{LoraConfig, TrainSchedule};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// YAML-backed defaults for a training run; individual CLI flags
/// override fields after loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub lora: LoraConfig,
    pub schedule: TrainSchedule,
}

impl TrainConfig {
    /// Load from a YAML file, or fall back to the built-in defaults when
    /// no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }
}
