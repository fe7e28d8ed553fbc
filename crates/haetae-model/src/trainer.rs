//! Adapter trainer
//!
//! Fine-tunes only the adapter parameters against a frozen backbone:
//! sequential mini-batch epochs with AdamW and cross-entropy loss, a full
//! validation pass after every epoch, and load-best-at-end model selection
//! on validation F1. The winning adapter state is persisted as an artifact
//! keyed to the backbone identifier.

use crate::artifact::AdapterArtifact;
use crate::backbone::Backbone;
use crate::encode::TextEncoder;
use crate::lora::LoraConfig;
use candle_core::{DType, Tensor};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use haetae_core::metrics::binary_report;
use haetae_core::{Error, Example, Label, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Training schedule; defaults follow the reference fine-tuning recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSchedule {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub weight_decay: f64,
    pub max_seq_len: usize,
    pub seed: u64,
}

impl Default for TrainSchedule {
    fn default() -> Self {
        Self {
            learning_rate: 2e-5,
            batch_size: 16,
            epochs: 3,
            weight_decay: 0.01,
            max_seq_len: 128,
            seed: 42,
        }
    }
}

/// Summary of a completed training run
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Zero-based index of the epoch whose adapter was kept
    pub best_epoch: usize,
    /// Validation F1 of the kept adapter
    pub best_f1: f64,
    /// Validation F1 per epoch, in order
    pub epoch_f1: Vec<f64>,
}

/// Train an adapter and persist the best-epoch state into `output_dir`.
///
/// The backbone is left composed with freshly-created adapter parameters;
/// its base weights are never touched. After the final epoch the best
/// snapshot is restored before serialization, so the artifact reflects the
/// epoch with the highest validation F1, not necessarily the last one.
pub fn train(
    backbone: &mut Backbone,
    encoder: &TextEncoder,
    lora: &LoraConfig,
    schedule: &TrainSchedule,
    train_set: &[Example],
    val_set: &[Example],
    output_dir: &Path,
) -> Result<TrainOutcome> {
    if train_set.is_empty() || val_set.is_empty() {
        return Err(Error::insufficient_data(
            "training and validation sets must be non-empty",
        ));
    }
    if schedule.batch_size == 0 || schedule.epochs == 0 {
        return Err(Error::config("batch size and epoch count must be non-zero"));
    }

    // All trainable state lives in this map; the backbone's own weights are
    // plain tensors and stay frozen.
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, backbone.device());
    backbone.attach_adapters(lora, &vb)?;

    let mut optimizer = AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: schedule.learning_rate,
            weight_decay: schedule.weight_decay,
            ..Default::default()
        },
    )
    .map_err(|e| Error::model(format!("failed to build optimizer: {e}")))?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(schedule.seed);
    let mut order: Vec<usize> = (0..train_set.len()).collect();

    let mut best_f1 = f64::NEG_INFINITY;
    let mut best_epoch = 0usize;
    let mut best_state: HashMap<String, Tensor> = HashMap::new();
    let mut epoch_f1 = Vec::with_capacity(schedule.epochs);

    for epoch in 0..schedule.epochs {
        order.shuffle(&mut rng);

        let mut epoch_loss = 0f64;
        let mut batches = 0usize;
        for chunk in order.chunks(schedule.batch_size) {
            let texts: Vec<&str> = chunk.iter().map(|&i| train_set[i].text.as_str()).collect();
            let labels: Vec<u32> = chunk
                .iter()
                .map(|&i| train_set[i].label.as_u8() as u32)
                .collect();

            let (input_ids, attention_mask) = encoder.encode_batch(&texts)?;
            let targets = Tensor::from_vec(labels, chunk.len(), backbone.device())
                .map_err(|e| Error::model(format!("failed to build target tensor: {e}")))?;

            let logits = backbone.forward(&input_ids, &attention_mask, true)?;
            let batch_loss = loss::cross_entropy(&logits, &targets)
                .map_err(|e| Error::model(format!("loss computation failed: {e}")))?;
            optimizer
                .backward_step(&batch_loss)
                .map_err(|e| Error::model(format!("optimizer step failed: {e}")))?;

            epoch_loss += batch_loss
                .to_scalar::<f32>()
                .map_err(|e| Error::model(format!("loss readback failed: {e}")))?
                as f64;
            batches += 1;
        }

        // Validation strictly after the full training pass of the epoch
        let predictions = predict_labels(backbone, encoder, val_set, schedule.batch_size)?;
        let truth: Vec<Label> = val_set.iter().map(|e| e.label).collect();
        let report = binary_report(&truth, &predictions)?;
        epoch_f1.push(report.f1);

        tracing::info!(
            epoch,
            mean_loss = epoch_loss / batches.max(1) as f64,
            val_f1 = report.f1,
            val_accuracy = report.accuracy,
            "epoch complete"
        );

        if report.f1 > best_f1 {
            best_f1 = report.f1;
            best_epoch = epoch;
            best_state = snapshot(&varmap)?;
        }
    }

    // Load-best-at-end: restore the winning epoch before persisting
    restore(&varmap, &best_state)?;
    AdapterArtifact::save(output_dir, backbone.id(), lora, &best_state)?;

    tracing::info!(best_epoch, best_f1, "training complete, best adapter saved");
    Ok(TrainOutcome {
        best_epoch,
        best_f1,
        epoch_f1,
    })
}

/// Argmax predictions over a labeled set, in input order
pub fn predict_labels(
    backbone: &Backbone,
    encoder: &TextEncoder,
    examples: &[Example],
    batch_size: usize,
) -> Result<Vec<Label>> {
    let mut predictions = Vec::with_capacity(examples.len());
    for chunk in examples.chunks(batch_size.max(1)) {
        let texts: Vec<&str> = chunk.iter().map(|e| e.text.as_str()).collect();
        let (input_ids, attention_mask) = encoder.encode_batch(&texts)?;
        let logits = backbone.forward(&input_ids, &attention_mask, false)?;

        let classes = logits
            .argmax(candle_core::D::Minus1)
            .and_then(|t| t.to_vec1::<u32>())
            .map_err(|e| Error::model(format!("argmax failed: {e}")))?;
        for class in classes {
            predictions.push(Label::from_u8(class as u8)?);
        }
    }
    Ok(predictions)
}

/// Copy the current adapter parameters out of the trainable store
fn snapshot(varmap: &VarMap) -> Result<HashMap<String, Tensor>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| Error::model("adapter parameter store poisoned"))?;
    let mut state = HashMap::with_capacity(data.len());
    for (name, var) in data.iter() {
        let copied = var
            .as_tensor()
            .copy()
            .map_err(|e| Error::model(format!("failed to snapshot {name}: {e}")))?;
        state.insert(name.clone(), copied);
    }
    Ok(state)
}

/// Write a snapshot back into the trainable store
fn restore(varmap: &VarMap, state: &HashMap<String, Tensor>) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| Error::model("adapter parameter store poisoned"))?;
    for (name, var) in data.iter() {
        let saved = state
            .get(name)
            .ok_or_else(|| Error::model(format!("snapshot is missing tensor {name}")))?;
        var.set(saved)
            .map_err(|e| Error::model(format!("failed to restore {name}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::test_support::tiny_backbone;
    use crate::encode::test_support::tiny_encoder;

    fn toy_sets() -> (Vec<Example>, Vec<Example>) {
        let train = vec![
            Example::new("good good good", Label::Clean),
            Example::new("bad bad bad", Label::Hate),
            Example::new("this is good", Label::Clean),
            Example::new("this is bad", Label::Hate),
        ];
        let val = vec![
            Example::new("good test", Label::Clean),
            Example::new("bad test", Label::Hate),
        ];
        (train, val)
    }

    #[test]
    fn test_training_produces_loadable_artifact() {
        let mut backbone = tiny_backbone("test/backbone");
        let encoder = tiny_encoder(16);
        let (train_set, val_set) = toy_sets();
        let dir = tempfile::tempdir().unwrap();

        let schedule = TrainSchedule {
            epochs: 2,
            batch_size: 2,
            learning_rate: 1e-3,
            ..Default::default()
        };
        let outcome = train(
            &mut backbone,
            &encoder,
            &LoraConfig::default(),
            &schedule,
            &train_set,
            &val_set,
            dir.path(),
        )
        .unwrap();

        assert_eq!(outcome.epoch_f1.len(), 2);
        assert!(outcome.best_epoch < 2);

        // The artifact composes back onto a fresh copy of the same backbone
        let artifact = AdapterArtifact::load(dir.path(), &candle_core::Device::Cpu).unwrap();
        let mut fresh = tiny_backbone("test/backbone");
        artifact.compose(&mut fresh).unwrap();
        assert!(fresh.has_adapters());
    }

    #[test]
    fn test_empty_sets_rejected() {
        let mut backbone = tiny_backbone("test/backbone");
        let encoder = tiny_encoder(16);
        let dir = tempfile::tempdir().unwrap();

        let err = train(
            &mut backbone,
            &encoder,
            &LoraConfig::default(),
            &TrainSchedule::default(),
            &[],
            &[],
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_predictions_preserve_order_and_length() {
        let mut backbone = tiny_backbone("test/backbone");
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, backbone.device());
        backbone
            .attach_adapters(&LoraConfig::default(), &vb)
            .unwrap();

        let encoder = tiny_encoder(16);
        let (train_set, _) = toy_sets();
        let predictions = predict_labels(&backbone, &encoder, &train_set, 3).unwrap();
        assert_eq!(predictions.len(), train_set.len());
    }
}
