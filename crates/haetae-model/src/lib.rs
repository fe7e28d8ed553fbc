//! Haetae Model
//!
//! The frozen pretrained backbone handle, LoRA adapter layers, adapter
//! artifact persistence and the adapter trainer. The backbone's weights are
//! read-only shared state; only adapter parameters are ever trained, and a
//! trained adapter records the backbone identifier it must be composed with.

pub mod artifact;
pub mod backbone;
pub mod config;
pub mod encode;
pub mod lora;
pub mod trainer;

pub use artifact::{AdapterArtifact, AdapterConfig};
pub use backbone::{Backbone, NUM_LABELS};
pub use config::{BackboneConfig, BackboneFiles, BackboneSource};
pub use encode::TextEncoder;
pub use lora::{LoraConfig, LoraDelta, LoraLinear};
pub use trainer::{predict_labels, train, TrainOutcome, TrainSchedule};
