//! Fire-and-forget observation hooks (`spec.md` §4.11).
//!
//! Mirrors the teacher's `Middleware` split in `core/middleware.rs`: a
//! trait the runner calls into after each unit of work, with a default
//! no-op so wiring an observer is opt-in.

use async_trait::async_trait;

use crate::store::{Decision, Label, MessageId, MessageStatus, ModelVersionId};

/// One scored message, reported after the decision has been persisted.
/// The full `{messageId, text, pSpam, decision, newStatus, trueLabel,
/// isCorrect}` record `spec.md` §4.6 specifies; `is_correct` is tri-state
/// (`None` whenever `decision == PendingReview`, since correctness is
/// undecided until a moderator reviews it).
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub message_id: MessageId,
    pub model_version_id: ModelVersionId,
    pub text: String,
    pub p_spam: f64,
    pub decision: Decision,
    pub new_status: MessageStatus,
    pub true_label: Option<Label>,
    pub is_correct: Option<bool>,
}

/// One completed retrain-and-activate cycle.
#[derive(Debug, Clone)]
pub struct RetrainResult {
    pub new_model_version_id: ModelVersionId,
    pub activated: bool,
}

/// Observes scoring and retraining outcomes. Implementations must not
/// block the runner loop; slow work should be spawned off.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn on_scored(&self, _result: &ScoringResult) {}
    async fn on_retrained(&self, _result: &RetrainResult) {}
}

/// The default observer: does nothing.
pub struct NullObserver;

#[async_trait]
impl Observer for NullObserver {}
