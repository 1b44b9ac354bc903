//! The classifier capability (`spec.md` §4.2).
//!
//! Treated by the agent runtime as an opaque, polymorphic capability — the
//! scoring and training services only ever reach it through the
//! [`Classifier`] trait. This module also ships one concrete, fully working
//! implementation, [`bow_logistic::BowLogisticClassifier`], grounded in the
//! teacher's own direct use of `candle_core`/`candle_nn` in
//! `worldmodel/dynamics.rs`.

pub mod bow_logistic;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::store::Metrics;

/// One labeled training example.
#[derive(Debug, Clone)]
pub struct LabeledText {
    pub text: String,
    pub is_spam: bool,
}

/// Train / Evaluate / Load / Predict, exactly the capability set named in
/// `spec.md` §4.2.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Trains a fresh model from `samples` and persists it to
    /// `artifact_path`. Fails with `InvalidInput` on an empty sample set.
    async fn train(&self, samples: &[LabeledText], artifact_path: &str) -> AppResult<()>;

    /// Evaluates the currently loaded model against `samples`.
    /// Fails with `NotReady` (mapped from the spec's `NotLoaded`) if no
    /// model has been trained or loaded yet.
    async fn evaluate(&self, samples: &[LabeledText]) -> AppResult<Metrics>;

    /// Loads a previously persisted artifact, replacing whatever model is
    /// currently in memory. Idempotent — loading the same path twice is a
    /// no-op beyond re-reading the file.
    async fn load(&self, artifact_path: &str) -> AppResult<()>;

    /// Scores a single piece of text, returning `pSpam ∈ [0, 1]`.
    /// Fails with `NotReady` if no model is loaded.
    async fn predict(&self, text: &str) -> AppResult<f64>;
}

/// Computes [`Metrics`] from raw confusion-matrix counts, applying the
/// zero-denominator conventions from `spec.md` §4.2 (`Precision`/`Recall`
/// default to 0, `F1` defaults to 0 when `P+R == 0`).
pub fn metrics_from_confusion(tp: u64, tn: u64, fp: u64, fn_: u64) -> Metrics {
    let total = tp + tn + fp + fn_;
    let accuracy = if total == 0 {
        0.0
    } else {
        (tp + tn) as f64 / total as f64
    };
    let precision = if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    };
    let recall = if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Metrics {
        accuracy,
        precision,
        recall,
        f1,
        tp,
        tn,
        fp,
        fn_,
    }
}
