//! In-memory [`Store`] backend.
//!
//! Grounded in `core/storage/dragonfly.rs`: that client wraps a single
//! shared connection behind `Arc<RwLock<Option<ConnectionManager>>>` and
//! funnels every operation through it. Here there is no external
//! connection to lazily establish, so the shared state is the tables
//! themselves — `dashmap::DashMap` per entity, already a teacher
//! dependency — with a `parking_lot::Mutex` guarding the handful of
//! operations (claim, activate, settings increments) that need
//! check-then-set atomicity across more than one key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;
use crate::store::{
    Message, MessageId, MessageStatus, ModelVersion, ModelVersionId, Prediction, Review, Source,
    Split, Store, StoreResult, SystemSettings,
};

/// A `Store` implementation backed entirely by in-process maps.
///
/// Satisfies `spec.md` §9's allowance of "an in-memory compare-and-swap for
/// tests" while remaining a fully usable runtime backend for a single
/// process — the claim, review, and activation protocols are all expressed
/// against the `Store` trait boundary, so a transactional SQL backend can
/// replace this one without touching any caller.
pub struct MemoryStore {
    messages: DashMap<MessageId, Message>,
    predictions: DashMap<u64, Prediction>,
    reviews: DashMap<MessageId, Review>,
    model_versions: DashMap<ModelVersionId, ModelVersion>,
    settings: Mutex<SystemSettings>,

    next_message_id: AtomicU64,
    next_prediction_id: AtomicU64,
    next_model_version_id: AtomicU64,
    next_model_version_number: AtomicU64,

    /// Guards the claim race and the active-model flip: both require
    /// "read current value, decide, write" to happen without another
    /// writer interleaving, which a bare `DashMap::entry` on a single key
    /// can't express when the decision spans a *selection* over many keys
    /// (claim) or a *sweep* over many keys (activate).
    claim_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(thresholds: (f64, f64), retrain_gold_threshold: u64) -> Self {
        MemoryStore {
            messages: DashMap::new(),
            predictions: DashMap::new(),
            reviews: DashMap::new(),
            model_versions: DashMap::new(),
            settings: Mutex::new(SystemSettings {
                active_model_version: None,
                threshold_allow: thresholds.0,
                threshold_block: thresholds.1,
                retrain_gold_threshold,
                new_gold_since_last_train: 0,
                auto_retrain_enabled: true,
                last_retrain_at: None,
            }),
            next_message_id: AtomicU64::new(1),
            next_prediction_id: AtomicU64::new(1),
            next_model_version_id: AtomicU64::new(1),
            next_model_version_number: AtomicU64::new(1),
            claim_lock: Mutex::new(()),
        }
    }

}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new((0.30, 0.70), 100)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_message(&self, mut msg: Message) -> StoreResult<Message> {
        let id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        msg.id = id;
        self.messages.insert(id, msg.clone());
        Ok(msg)
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Message> {
        self.messages
            .get(&id)
            .map(|m| m.clone())
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn update_message(&self, msg: Message) -> StoreResult<()> {
        if !self.messages.contains_key(&msg.id) {
            return Err(AppError::NotFound(format!("message {}", msg.id)));
        }
        self.messages.insert(msg.id, msg);
        Ok(())
    }

    async fn delete_message(&self, id: MessageId) -> StoreResult<()> {
        self.messages.remove(&id);
        Ok(())
    }

    async fn list_messages_by_status(&self, status: MessageStatus) -> StoreResult<Vec<Message>> {
        let mut out: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.status == status)
            .map(|m| m.clone())
            .collect();
        out.sort_by_key(|m| m.created_at);
        Ok(out)
    }

    async fn list_messages_by_source_split(
        &self,
        source: Source,
        split: Option<Split>,
    ) -> StoreResult<Vec<Message>> {
        let mut out: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| {
                m.source == source
                    && match split {
                        Some(s) => m.split == Some(s),
                        None => true,
                    }
            })
            .map(|m| m.clone())
            .collect();
        out.sort_by_key(|m| m.id);
        Ok(out)
    }

    async fn counts_by_status(&self) -> StoreResult<std::collections::HashMap<String, u64>> {
        let mut counts = std::collections::HashMap::new();
        for m in self.messages.iter() {
            if m.source != Source::Runtime {
                continue;
            }
            *counts.entry(format!("{:?}", m.status)).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn compare_and_set_message_status(
        &self,
        id: MessageId,
        expected: MessageStatus,
        new: MessageStatus,
    ) -> StoreResult<bool> {
        let _guard = self.claim_lock.lock();
        match self.messages.get_mut(&id) {
            Some(mut entry) => {
                if entry.status == expected {
                    entry.status = new;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Err(AppError::NotFound(format!("message {id}"))),
        }
    }

    async fn insert_prediction(&self, mut prediction: Prediction) -> StoreResult<Prediction> {
        let id = self.next_prediction_id.fetch_add(1, Ordering::SeqCst);
        prediction.id = id;
        self.predictions.insert(id, prediction.clone());
        Ok(prediction)
    }

    async fn insert_review(&self, review: Review) -> StoreResult<()> {
        let mut inserted = false;
        self.reviews.entry(review.message_id).or_insert_with(|| {
            inserted = true;
            review.clone()
        });
        if inserted {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "review already exists for message {}",
                review.message_id
            )))
        }
    }

    async fn get_review_by_message(&self, id: MessageId) -> StoreResult<Option<Review>> {
        Ok(self.reviews.get(&id).map(|r| r.clone()))
    }

    async fn list_reviewed_messages(&self) -> StoreResult<Vec<Message>> {
        let mut out: Vec<Message> = self
            .reviews
            .iter()
            .filter_map(|r| self.messages.get(r.key()).map(|m| m.clone()))
            .collect();
        out.sort_by_key(|m| m.id);
        Ok(out)
    }

    async fn next_model_version(&self) -> StoreResult<u64> {
        Ok(self.next_model_version_number.fetch_add(1, Ordering::SeqCst))
    }

    async fn insert_model_version(&self, mut version: ModelVersion) -> StoreResult<ModelVersion> {
        let id = ModelVersionId(self.next_model_version_id.fetch_add(1, Ordering::SeqCst));
        version.id = id;
        self.model_versions.insert(id, version.clone());
        Ok(version)
    }

    async fn get_model_version(&self, id: ModelVersionId) -> StoreResult<ModelVersion> {
        self.model_versions
            .get(&id)
            .map(|m| m.clone())
            .ok_or_else(|| AppError::NotFound(format!("model version {id}")))
    }

    async fn list_model_versions(&self) -> StoreResult<Vec<ModelVersion>> {
        let mut out: Vec<ModelVersion> = self.model_versions.iter().map(|m| m.clone()).collect();
        out.sort_by_key(|m| m.version);
        Ok(out)
    }

    async fn activate_model_version(&self, target: ModelVersionId) -> StoreResult<()> {
        let _guard = self.claim_lock.lock();

        if !self.model_versions.contains_key(&target) {
            return Err(AppError::NotFound(format!("model version {target}")));
        }

        for mut entry in self.model_versions.iter_mut() {
            entry.is_active = entry.id == target;
        }

        let mut settings = self.settings.lock();
        settings.active_model_version = Some(target);
        Ok(())
    }

    async fn get_settings(&self) -> StoreResult<SystemSettings> {
        Ok(self.settings.lock().clone())
    }

    async fn set_thresholds(&self, allow: f64, block: f64) -> StoreResult<()> {
        if !(0.0..=1.0).contains(&allow) || !(0.0..=1.0).contains(&block) || allow > block {
            return Err(AppError::InvalidInput(format!(
                "thresholds must satisfy 0<=allow<=block<=1, got allow={allow} block={block}"
            )));
        }
        let mut settings = self.settings.lock();
        settings.threshold_allow = allow;
        settings.threshold_block = block;
        Ok(())
    }

    async fn set_auto_retrain_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.settings.lock().auto_retrain_enabled = enabled;
        Ok(())
    }

    async fn set_retrain_gold_threshold(&self, threshold: u64) -> StoreResult<()> {
        self.settings.lock().retrain_gold_threshold = threshold;
        Ok(())
    }

    async fn increment_new_gold(&self) -> StoreResult<u64> {
        let mut settings = self.settings.lock();
        settings.new_gold_since_last_train += 1;
        Ok(settings.new_gold_since_last_train)
    }

    async fn reset_new_gold(&self, at: DateTime<Utc>) -> StoreResult<()> {
        let mut settings = self.settings.lock();
        settings.new_gold_since_last_train = 0;
        settings.last_retrain_at = Some(at);
        Ok(())
    }
}
