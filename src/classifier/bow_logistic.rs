//! Bag-of-words logistic regression.
//!
//! A small, real `candle_core`/`candle_nn` graph — not a lookalike stub.
//! Mirrors `worldmodel/dynamics.rs`'s pattern of hand-building a `Linear`
//! over raw tensors, except trained rather than randomly initialized, and
//! persisted to disk via `candle_nn::VarMap` safetensors rather than kept
//! process-lifetime only.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, Optimizer, VarBuilder, VarMap, SGD};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{metrics_from_confusion, Classifier, LabeledText};
use crate::error::{AppError, AppResult};
use crate::store::Metrics;

const MAX_VOCAB: usize = 4000;
const EPOCHS: usize = 30;
const LEARNING_RATE: f64 = 0.5;
const DECISION_CUTOFF: f64 = 0.5;

fn tokenize(text: &str) -> Vec<String> {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .map(|tok| tok.to_string())
        .collect()
}

fn build_vocab(samples: &[LabeledText]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sample in samples {
        for tok in tokenize(&sample.text) {
            *counts.entry(tok).or_insert(0) += 1;
        }
    }
    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(MAX_VOCAB);
    terms.into_iter().map(|(term, _)| term).collect()
}

fn vectorize(text: &str, vocab: &HashMap<String, usize>) -> Vec<f32> {
    let mut row = vec![0.0f32; vocab.len()];
    for tok in tokenize(text) {
        if let Some(&idx) = vocab.get(&tok) {
            row[idx] = 1.0;
        }
    }
    row
}

fn to_candle_err(e: candle_core::Error) -> AppError {
    AppError::TrainingFailed(format!("candle error: {e}"))
}

struct LoadedModel {
    vocab: HashMap<String, usize>,
    linear: Linear,
    device: Device,
}

/// Bag-of-words vectorization feeding a single-layer logistic regression,
/// trained by minimizing binary cross-entropy with plain SGD.
pub struct BowLogisticClassifier {
    state: RwLock<Option<LoadedModel>>,
}

impl BowLogisticClassifier {
    pub fn new() -> Self {
        BowLogisticClassifier {
            state: RwLock::new(None),
        }
    }

    fn vocab_sidecar_path(artifact_path: &str) -> String {
        format!("{artifact_path}.vocab.json")
    }

    fn forward_batch(
        linear: &Linear,
        device: &Device,
        rows: &[Vec<f32>],
    ) -> candle_core::Result<Tensor> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let input = Tensor::from_vec(flat, (rows.len(), width), device)?;
        let logits = linear.forward(&input)?;
        candle_nn::ops::sigmoid(&logits)
    }
}

impl Default for BowLogisticClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Classifier for BowLogisticClassifier {
    async fn train(&self, samples: &[LabeledText], artifact_path: &str) -> AppResult<()> {
        if samples.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot train on an empty sample set".to_string(),
            ));
        }

        let vocab_terms = build_vocab(samples);
        let vocab: HashMap<String, usize> = vocab_terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        let vocab_size = vocab.len().max(1);
        let device = Device::Cpu;

        let rows: Vec<Vec<f32>> = samples.iter().map(|s| vectorize(&s.text, &vocab)).collect();
        let labels: Vec<f32> = samples
            .iter()
            .map(|s| if s.is_spam { 1.0 } else { 0.0 })
            .collect();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let linear = candle_nn::linear(vocab_size, 1, vb.pp("linear")).map_err(to_candle_err)?;

        let mut sgd = SGD::new(varmap.all_vars(), LEARNING_RATE).map_err(to_candle_err)?;
        let target = Tensor::from_vec(labels, (samples.len(), 1), &device).map_err(to_candle_err)?;

        for epoch in 0..EPOCHS {
            let probs = Self::forward_batch(&linear, &device, &rows).map_err(to_candle_err)?;
            let eps = 1e-7f64;
            let probs_clamped = probs
                .clamp(eps as f32, (1.0 - eps) as f32)
                .map_err(to_candle_err)?;
            let one_minus_p = (1.0 - &probs_clamped).map_err(to_candle_err)?;
            let one_minus_y = (1.0 - &target).map_err(to_candle_err)?;
            let pos_term = (&target * probs_clamped.log().map_err(to_candle_err)?)
                .map_err(to_candle_err)?;
            let neg_term =
                (one_minus_y * one_minus_p.log().map_err(to_candle_err)?).map_err(to_candle_err)?;
            let loss = (pos_term + neg_term)
                .map_err(to_candle_err)?
                .mean_all()
                .map_err(to_candle_err)?
                .neg()
                .map_err(to_candle_err)?;

            sgd.backward_step(&loss).map_err(to_candle_err)?;

            if epoch % 10 == 0 {
                let loss_value = loss.to_scalar::<f32>().unwrap_or(f32::NAN);
                info!(epoch, loss = loss_value, "bow-logistic training step");
            }
        }

        if let Some(parent) = Path::new(artifact_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::TrainingFailed(format!("artifact dir: {e}")))?;
            }
        }
        varmap
            .save(artifact_path)
            .map_err(|e| AppError::TrainingFailed(format!("saving artifact: {e}")))?;

        let vocab_json = serde_json::to_string(&vocab_terms)
            .map_err(|e| AppError::TrainingFailed(format!("serializing vocab: {e}")))?;
        std::fs::write(Self::vocab_sidecar_path(artifact_path), vocab_json)
            .map_err(|e| AppError::TrainingFailed(format!("writing vocab sidecar: {e}")))?;

        *self.state.write() = Some(LoadedModel {
            vocab,
            linear,
            device,
        });

        info!(path = artifact_path, "bow-logistic model trained and persisted");
        Ok(())
    }

    async fn evaluate(&self, samples: &[LabeledText]) -> AppResult<Metrics> {
        let mut tp = 0u64;
        let mut tn = 0u64;
        let mut fp = 0u64;
        let mut fn_ = 0u64;

        for sample in samples {
            let p_spam = self.predict(&sample.text).await?;
            let predicted_spam = p_spam >= DECISION_CUTOFF;
            match (predicted_spam, sample.is_spam) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }

        Ok(metrics_from_confusion(tp, tn, fp, fn_))
    }

    async fn load(&self, artifact_path: &str) -> AppResult<()> {
        let vocab_json = std::fs::read_to_string(Self::vocab_sidecar_path(artifact_path))
            .map_err(|e| AppError::NotFound(format!("vocab sidecar missing: {e}")))?;
        let vocab_terms: Vec<String> = serde_json::from_str(&vocab_json)
            .map_err(|e| AppError::InvalidState(format!("corrupt vocab sidecar: {e}")))?;
        let vocab: HashMap<String, usize> = vocab_terms
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i))
            .collect();
        let vocab_size = vocab.len().max(1);

        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let linear = candle_nn::linear(vocab_size, 1, vb.pp("linear")).map_err(to_candle_err)?;
        varmap
            .load(artifact_path)
            .map_err(|e| AppError::NotFound(format!("artifact missing or unreadable: {e}")))?;

        *self.state.write() = Some(LoadedModel {
            vocab,
            linear,
            device,
        });

        info!(path = artifact_path, "bow-logistic model loaded");
        Ok(())
    }

    async fn predict(&self, text: &str) -> AppResult<f64> {
        let guard = self.state.read();
        let model = guard
            .as_ref()
            .ok_or_else(|| AppError::NotReady("no bow-logistic model loaded".to_string()))?;

        let row = vectorize(text, &model.vocab);
        let probs = Self::forward_batch(&model.linear, &model.device, std::slice::from_ref(&row))
            .map_err(|e| {
                warn!("candle inference error: {e}");
                to_candle_err(e)
            })?;
        let value = probs
            .reshape(1)
            .and_then(|t| t.to_scalar::<f32>())
            .map_err(to_candle_err)?;
        Ok(value as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, is_spam: bool) -> LabeledText {
        LabeledText {
            text: text.to_string(),
            is_spam,
        }
    }

    fn training_set() -> Vec<LabeledText> {
        vec![
            sample("win a free prize now call now", true),
            sample("free free free cash prize winner", true),
            sample("urgent reply now claim your free prize", true),
            sample("are we still meeting for lunch tomorrow", false),
            sample("can you send me the report before noon", false),
            sample("thanks for the update see you tomorrow", false),
        ]
    }

    #[tokio::test]
    async fn trains_and_predicts_without_loading_a_model_first() {
        let classifier = BowLogisticClassifier::new();
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.safetensors");
        let artifact_path = artifact.to_str().unwrap();

        classifier
            .train(&training_set(), artifact_path)
            .await
            .unwrap();

        let p = classifier.predict("free prize winner call now").await.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[tokio::test]
    async fn predict_before_any_train_or_load_is_not_ready() {
        let classifier = BowLogisticClassifier::new();
        let err = classifier.predict("hello").await.unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));
    }

    #[tokio::test]
    async fn load_roundtrips_a_trained_artifact() {
        let classifier = BowLogisticClassifier::new();
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.safetensors");
        let artifact_path = artifact.to_str().unwrap();
        classifier
            .train(&training_set(), artifact_path)
            .await
            .unwrap();

        let fresh = BowLogisticClassifier::new();
        fresh.load(artifact_path).await.unwrap();
        let p = fresh.predict("meeting tomorrow for lunch").await.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[tokio::test]
    async fn train_on_empty_samples_is_invalid_input() {
        let classifier = BowLogisticClassifier::new();
        let err = classifier.train(&[], "unused").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
