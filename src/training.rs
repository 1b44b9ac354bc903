//! The training service (`spec.md` §4.5).
//!
//! Training is serialized behind a single `tokio::sync::Mutex` —
//! `TrainingService`'s answer to the open question in `spec.md` §9 about
//! overlapping trainings. Both the direct synchronous trigger (from
//! `ReviewService::add_review`'s caller) and the periodic retrain runner
//! go through the same `TrainingService` instance, so they share this
//! lock rather than racing to produce two version numbers.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::classifier::{Classifier, LabeledText};
use crate::error::{AppError, AppResult};
use crate::store::{Message, ModelVersion, ModelVersionId, Source, Split, Store, TrainTemplate};

/// Outcome of one completed (or failed) `TrainModel` invocation.
#[derive(Debug, Clone)]
pub struct TrainResult {
    pub model_version: ModelVersion,
    pub activated: bool,
}

pub struct TrainingService {
    store: Arc<dyn Store>,
    classifier: Arc<dyn Classifier>,
    models_directory: String,
    lock: Mutex<()>,
}

impl TrainingService {
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn Classifier>, models_directory: String) -> Self {
        TrainingService {
            store,
            classifier,
            models_directory,
            lock: Mutex::new(()),
        }
    }

    fn to_labeled(messages: &[Message]) -> Vec<LabeledText> {
        messages
            .iter()
            .filter_map(|m| {
                m.true_label.map(|label| LabeledText {
                    text: m.text.clone(),
                    is_spam: label.is_spam(),
                })
            })
            .collect()
    }

    async fn assemble_training_set(&self, template: TrainTemplate) -> AppResult<Vec<Message>> {
        let mut pool = self
            .store
            .list_messages_by_source_split(Source::Dataset, Some(Split::TrainPool))
            .await?;
        pool.retain(|m| m.true_label.is_some());
        pool.sort_by_key(|m| m.id);
        pool.truncate(template.size_cap());

        let gold = self.store.list_reviewed_messages().await?;
        pool.extend(gold);
        Ok(pool)
    }

    async fn assemble_validation_set(&self) -> AppResult<Vec<Message>> {
        let mut holdout = self
            .store
            .list_messages_by_source_split(Source::Dataset, Some(Split::ValidationHoldout))
            .await?;
        holdout.retain(|m| m.true_label.is_some());
        holdout.sort_by_key(|m| m.id);
        Ok(holdout)
    }

    /// `TrainModel` (`spec.md` §4.5): assembles the training and frozen
    /// validation sets, trains, evaluates, persists a new `ModelVersion`,
    /// and optionally activates it. Fails with `InvalidState` on an empty
    /// training set and `TrainingFailed` if the classifier errors,
    /// leaving the prior active version untouched.
    pub async fn train_model(
        &self,
        template: TrainTemplate,
        activate: bool,
    ) -> AppResult<TrainResult> {
        let _guard = self.lock.lock().await;

        let training_rows = self.assemble_training_set(template).await?;
        if training_rows.is_empty() {
            return Err(AppError::InvalidState(
                "training set is empty".to_string(),
            ));
        }
        let gold_included_count = self.store.list_reviewed_messages().await?.len();
        let validation_rows = self.assemble_validation_set().await?;

        let version_number = self.store.next_model_version().await?;
        let artifact_path = Path::new(&self.models_directory)
            .join(format!("model-v{version_number}.safetensors"))
            .to_string_lossy()
            .into_owned();

        let training_samples = Self::to_labeled(&training_rows);
        let validation_samples = Self::to_labeled(&validation_rows);

        self.classifier
            .train(&training_samples, &artifact_path)
            .await
            .map_err(|e| AppError::TrainingFailed(e.to_string()))?;

        let metrics = self
            .classifier
            .evaluate(&validation_samples)
            .await
            .map_err(|e| AppError::TrainingFailed(e.to_string()))?;

        let settings = self.store.get_settings().await?;
        let model_version = self
            .store
            .insert_model_version(ModelVersion {
                id: ModelVersionId(0),
                version: version_number,
                train_template: template,
                train_set_size: training_rows.len(),
                gold_included_count,
                validation_set_size: validation_rows.len(),
                metrics,
                threshold_allow: settings.threshold_allow,
                threshold_block: settings.threshold_block,
                artifact_path: artifact_path.clone(),
                created_at: Utc::now(),
                is_active: false,
            })
            .await?;

        let activated = if activate {
            self.activate_model_locked(model_version.id).await?;
            true
        } else {
            false
        };

        self.store.reset_new_gold(Utc::now()).await?;

        info!(
            version = model_version.version,
            train_set_size = model_version.train_set_size,
            validation_set_size = model_version.validation_set_size,
            activated,
            "training run complete"
        );

        Ok(TrainResult {
            model_version,
            activated,
        })
    }

    /// `ActivateModel` (`spec.md` §4.5): flips the active pointer and
    /// loads the artifact into the classifier capability. Steps 1-3 (the
    /// store-side flip) are a single transaction; step 4 (the classifier
    /// load) happens after, per §5.
    pub async fn activate_model(&self, version_id: ModelVersionId) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        self.activate_model_locked(version_id).await
    }

    async fn activate_model_locked(&self, version_id: ModelVersionId) -> AppResult<()> {
        self.store.activate_model_version(version_id).await?;
        let version = self.store.get_model_version(version_id).await?;
        self.classifier.load(&version.artifact_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::bow_logistic::BowLogisticClassifier;
    use crate::store::memory::MemoryStore;
    use crate::store::{Label, Message, MessageId, MessageStatus};

    fn dataset_row(id: u64, text: &str, label: Label, split: Split) -> Message {
        Message {
            id: MessageId(id),
            text: text.to_string(),
            source: Source::Dataset,
            split: Some(split),
            true_label: Some(label),
            status: MessageStatus::Dataset,
            created_at: Utc::now(),
            last_model_version: None,
        }
    }

    async fn seeded_store() -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let train_rows = [
            ("win free cash now call now", Label::Spam),
            ("urgent reply claim your free prize", Label::Spam),
            ("are we still meeting tomorrow", Label::Ham),
            ("thanks for the update see you soon", Label::Ham),
        ];
        for (text, label) in train_rows {
            store
                .insert_message(dataset_row(0, text, label, Split::TrainPool))
                .await
                .unwrap();
        }
        let holdout_rows = [
            ("free prize winner call now", Label::Spam),
            ("lunch tomorrow at noon", Label::Ham),
        ];
        for (text, label) in holdout_rows {
            store
                .insert_message(dataset_row(0, text, label, Split::ValidationHoldout))
                .await
                .unwrap();
        }
        store
    }

    fn service(store: Arc<dyn Store>) -> TrainingService {
        let dir = tempfile::tempdir().unwrap();
        TrainingService::new(
            store,
            Arc::new(BowLogisticClassifier::new()),
            dir.path().to_string_lossy().into_owned(),
        )
    }

    #[tokio::test]
    async fn empty_training_set_is_invalid_state() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let svc = service(store);
        let err = svc
            .train_model(TrainTemplate::Light, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn train_with_activate_flips_active_pointer_and_resets_counter() {
        let store = seeded_store().await;
        store.increment_new_gold().await.unwrap();
        let svc = service(store.clone());

        let result = svc
            .train_model(TrainTemplate::Full, true)
            .await
            .unwrap();

        assert!(result.activated);
        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.active_model_version, Some(result.model_version.id));
        assert_eq!(settings.new_gold_since_last_train, 0);
    }

    #[tokio::test]
    async fn validation_set_is_stable_across_two_trainings() {
        let store = seeded_store().await;
        let svc = service(store.clone());

        let first = svc.train_model(TrainTemplate::Medium, false).await.unwrap();
        let second = svc.train_model(TrainTemplate::Light, false).await.unwrap();

        assert_eq!(
            first.model_version.validation_set_size,
            second.model_version.validation_set_size
        );
    }
}
