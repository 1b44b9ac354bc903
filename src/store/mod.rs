//! Durable-shaped entity storage.
//!
//! Mirrors the teacher's `core::storage` split: a backend-agnostic trait
//! (`KeyValueStore` there, [`Store`] here) plus one concrete backend
//! (`DragonflyClient` there, [`memory::MemoryStore`] here). The entities and
//! the conditional-update primitive are new — they encode `spec.md` §3/§4.1
//! — but the shape (typed trait methods over `async_trait`, a dedicated
//! error enum, a `StorageResult<T>` alias) is lifted directly from
//! `core/storage/mod.rs`.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque monotonic message identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Opaque monotonic model version identity (distinct from the
/// human-facing `version` counter on [`ModelVersion`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelVersionId(pub u64);

impl fmt::Display for ModelVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Where a message originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Dataset,
    Runtime,
}

/// Which partition of the imported dataset a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    TrainPool,
    ValidationHoldout,
}

/// Ground-truth label, either imported or supplied by a moderator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    pub fn is_spam(&self) -> bool {
        matches!(self, Label::Spam)
    }

    pub fn parse(raw: &str) -> Option<Label> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ham" => Some(Label::Ham),
            "spam" => Some(Label::Spam),
            _ => None,
        }
    }
}

/// Lifecycle status of a [`Message`], per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Imported sample, never enqueued directly.
    Dataset,
    /// Imported sample already copied into a runtime message; excluded from
    /// future `EnqueueFromValidation` draws.
    Scored,
    /// Awaiting scoring.
    Queued,
    /// Claimed by exactly one scorer.
    Processing,
    /// Terminal: classifier allowed it through.
    InInbox,
    /// Terminal: classifier blocked it.
    InSpam,
    /// Scorer deferred; awaits moderator.
    PendingReview,
}

/// The three-zone scoring outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    PendingReview,
    Block,
}

/// Training-set sizing preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainTemplate {
    Light,
    Medium,
    Full,
}

impl TrainTemplate {
    /// Cap on the number of dataset rows drawn into the training set,
    /// per `spec.md` §4.5.
    pub fn size_cap(&self) -> usize {
        match self {
            TrainTemplate::Light => 500,
            TrainTemplate::Medium => 2000,
            TrainTemplate::Full => usize::MAX,
        }
    }

    pub fn parse(raw: &str) -> Option<TrainTemplate> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(TrainTemplate::Light),
            "medium" => Some(TrainTemplate::Medium),
            "full" => Some(TrainTemplate::Full),
            _ => None,
        }
    }
}

/// The unit of work flowing through the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub source: Source,
    pub split: Option<Split>,
    pub true_label: Option<Label>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub last_model_version: Option<ModelVersionId>,
}

/// An immutable record of one scoring attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: u64,
    pub message_id: MessageId,
    pub model_version_id: ModelVersionId,
    pub p_spam: f64,
    pub decision: Decision,
    pub created_at: DateTime<Utc>,
}

/// A moderator's gold label for one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub message_id: MessageId,
    pub label: Label,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Evaluation metrics produced by `Classifier::evaluate`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub tp: u64,
    pub tn: u64,
    pub fp: u64,
    pub fn_: u64,
}

/// An artifact produced by one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub id: ModelVersionId,
    pub version: u64,
    pub train_template: TrainTemplate,
    pub train_set_size: usize,
    pub gold_included_count: usize,
    pub validation_set_size: usize,
    pub metrics: Metrics,
    pub threshold_allow: f64,
    pub threshold_block: f64,
    pub artifact_path: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// The process-lifetime singleton control row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    pub active_model_version: Option<ModelVersionId>,
    pub threshold_allow: f64,
    pub threshold_block: f64,
    pub retrain_gold_threshold: u64,
    pub new_gold_since_last_train: u64,
    pub auto_retrain_enabled: bool,
    pub last_retrain_at: Option<DateTime<Utc>>,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, crate::error::AppError>;

/// Durable mapping of entities plus the one conditional-update primitive
/// every other service composes (`spec.md` §4.1).
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_message(&self, msg: Message) -> StoreResult<Message>;
    async fn get_message(&self, id: MessageId) -> StoreResult<Message>;
    async fn update_message(&self, msg: Message) -> StoreResult<()>;
    async fn delete_message(&self, id: MessageId) -> StoreResult<()>;
    async fn list_messages_by_status(&self, status: MessageStatus) -> StoreResult<Vec<Message>>;
    async fn list_messages_by_source_split(
        &self,
        source: Source,
        split: Option<Split>,
    ) -> StoreResult<Vec<Message>>;
    async fn counts_by_status(&self) -> StoreResult<std::collections::HashMap<String, u64>>;

    /// Atomically transitions a message's status iff it currently holds
    /// `expected`. Returns `true` iff the row matched and was updated.
    /// The sole mechanism behind queue claim and review-status mutation.
    async fn compare_and_set_message_status(
        &self,
        id: MessageId,
        expected: MessageStatus,
        new: MessageStatus,
    ) -> StoreResult<bool>;

    async fn insert_prediction(&self, prediction: Prediction) -> StoreResult<Prediction>;

    async fn insert_review(&self, review: Review) -> StoreResult<()>;
    async fn get_review_by_message(&self, id: MessageId) -> StoreResult<Option<Review>>;

    /// Every message that has a `Review` attached, i.e. the gold-labeled
    /// pool `TrainModel` concatenates onto the sampled training set
    /// (`spec.md` §4.5 step 1).
    async fn list_reviewed_messages(&self) -> StoreResult<Vec<Message>>;

    async fn next_model_version(&self) -> StoreResult<u64>;
    async fn insert_model_version(&self, version: ModelVersion) -> StoreResult<ModelVersion>;
    async fn get_model_version(&self, id: ModelVersionId) -> StoreResult<ModelVersion>;
    async fn list_model_versions(&self) -> StoreResult<Vec<ModelVersion>>;

    /// Atomically clears `is_active` on every row and sets it on `target`.
    /// Steps 1–2 of `ActivateModel` (`spec.md` §4.5); must be a single
    /// transaction with respect to concurrent readers.
    async fn activate_model_version(&self, target: ModelVersionId) -> StoreResult<()>;

    async fn get_settings(&self) -> StoreResult<SystemSettings>;
    async fn set_thresholds(&self, allow: f64, block: f64) -> StoreResult<()>;
    async fn set_auto_retrain_enabled(&self, enabled: bool) -> StoreResult<()>;
    async fn set_retrain_gold_threshold(&self, threshold: u64) -> StoreResult<()>;

    /// Increments `new_gold_since_last_train` by exactly one and returns the
    /// new value (`spec.md` §4.4 step 3).
    async fn increment_new_gold(&self) -> StoreResult<u64>;

    /// Resets the gold counter to zero and stamps `last_retrain_at`
    /// (`spec.md` §4.5 step 8).
    async fn reset_new_gold(&self, at: DateTime<Utc>) -> StoreResult<()>;
}
