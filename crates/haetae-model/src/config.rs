//! Backbone configuration and weight resolution
//!
//! A backbone lives in a directory holding `config.json`, `tokenizer.json`
//! and `model.safetensors`, either on the local file system or downloaded
//! from the Hugging Face Hub.

use haetae_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Encoder hyperparameters, read from the backbone's `config.json`.
///
/// Field names and defaults follow the Hugging Face BERT/ELECTRA convention
/// so stock checkpoints load without translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackboneConfig {
    pub vocab_size: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_layers")]
    pub num_hidden_layers: usize,
    #[serde(default = "default_num_heads")]
    pub num_attention_heads: usize,
    #[serde(default = "default_intermediate_size")]
    pub intermediate_size: usize,
    #[serde(default = "default_max_position")]
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    /// Checkpoint provenance, when the exporter recorded it
    #[serde(rename = "_name_or_path", default, skip_serializing_if = "Option::is_none")]
    pub name_or_path: Option<String>,
}

fn default_hidden_size() -> usize {
    768
}
fn default_num_layers() -> usize {
    12
}
fn default_num_heads() -> usize {
    12
}
fn default_intermediate_size() -> usize {
    3072
}
fn default_max_position() -> usize {
    512
}
fn default_type_vocab() -> usize {
    2
}
fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BackboneConfig {
    /// Load from a `config.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        if config.hidden_size % config.num_attention_heads != 0 {
            return Err(Error::config(format!(
                "hidden size {} is not divisible by {} attention heads",
                config.hidden_size, config.num_attention_heads
            )));
        }
        Ok(config)
    }

    /// Per-head dimension of the attention projections
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}

/// Where backbone weights come from
#[derive(Debug, Clone)]
pub enum BackboneSource {
    /// A local directory with the three model files
    Local(PathBuf),

    /// A Hugging Face Hub repository
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
    },
}

impl BackboneSource {
    /// Interpret a CLI argument: an existing path wins, anything else is
    /// treated as a Hub repository id.
    pub fn parse(spec: &str) -> Self {
        let path = PathBuf::from(spec);
        if path.exists() {
            Self::Local(path)
        } else {
            Self::HuggingFace {
                repo_id: spec.to_string(),
                revision: None,
            }
        }
    }

    /// Resolve to concrete file paths, downloading from the Hub if needed.
    pub fn resolve(&self) -> Result<BackboneFiles> {
        match self {
            Self::Local(dir) => {
                if !dir.is_dir() {
                    return Err(Error::config(format!(
                        "backbone directory not found: {}",
                        dir.display()
                    )));
                }
                let files = BackboneFiles {
                    id: local_backbone_id(dir)?,
                    config: dir.join("config.json"),
                    tokenizer: dir.join("tokenizer.json"),
                    weights: dir.join("model.safetensors"),
                };
                for path in [&files.config, &files.tokenizer, &files.weights] {
                    if !path.exists() {
                        return Err(Error::config(format!(
                            "backbone file missing: {}",
                            path.display()
                        )));
                    }
                }
                Ok(files)
            }
            Self::HuggingFace { repo_id, revision } => {
                tracing::info!(repo = %repo_id, "downloading backbone from Hugging Face Hub");

                let api = hf_hub::api::sync::Api::new().map_err(|e| {
                    Error::config(format!("failed to initialize Hub API: {e}"))
                })?;
                let repo = api.repo(hf_hub::Repo::with_revision(
                    repo_id.clone(),
                    hf_hub::RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                let fetch = |file: &str| {
                    repo.get(file).map_err(|e| {
                        Error::config(format!("failed to download {file} from {repo_id}: {e}"))
                    })
                };

                Ok(BackboneFiles {
                    id: repo_id.clone(),
                    config: fetch("config.json")?,
                    tokenizer: fetch("tokenizer.json")?,
                    weights: fetch("model.safetensors")?,
                })
            }
        }
    }
}

/// Resolved backbone file set plus the identifier adapters are keyed on
#[derive(Debug, Clone)]
pub struct BackboneFiles {
    /// Stable backbone identifier recorded in adapter artifacts
    pub id: String,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Identifier for a local checkout: the recorded provenance when present,
/// otherwise the directory name.
fn local_backbone_id(dir: &Path) -> Result<String> {
    let config_path = dir.join("config.json");
    if config_path.exists() {
        let config = BackboneConfig::from_file(&config_path)?;
        if let Some(name) = config.name_or_path {
            return Ok(name);
        }
    }
    Ok(dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let json = r#"{ "vocab_size": 32200 }"#;
        let config: BackboneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vocab_size, 32200);
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.head_dim(), 64);
    }

    #[test]
    fn test_config_rejects_bad_head_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{ "vocab_size": 100, "hidden_size": 10, "num_attention_heads": 3 }"#)
            .unwrap();

        assert!(BackboneConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_source_parse_prefers_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = BackboneSource::parse(dir.path().to_str().unwrap());
        assert!(matches!(source, BackboneSource::Local(_)));

        let source = BackboneSource::parse("beomi/KcELECTRA-base-v2022");
        assert!(matches!(source, BackboneSource::HuggingFace { .. }));
    }

    #[test]
    fn test_local_resolve_requires_all_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{ "vocab_size": 16 }"#).unwrap();

        let err = BackboneSource::Local(dir.path().to_path_buf())
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_local_backbone_id_prefers_recorded_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{ "vocab_size": 16, "_name_or_path": "beomi/KcELECTRA-base-v2022" }"#,
        )
        .unwrap();

        let id = local_backbone_id(dir.path()).unwrap();
        assert_eq!(id, "beomi/KcELECTRA-base-v2022");
    }
}
