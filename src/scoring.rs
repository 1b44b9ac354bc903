//! The scoring pipeline (`spec.md` §4.4).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::classifier::Classifier;
use crate::error::{AppError, AppResult};
use crate::events::{Observer, ScoringResult};
use crate::store::{Decision, Label, Message, MessageId, MessageStatus, Prediction, Store};

/// Applies the three-zone policy from `spec.md` §4.4:
/// `pSpam < allow` → `Allow`, `pSpam >= block` → `Block`, else `PendingReview`.
pub fn decide(p_spam: f64, threshold_allow: f64, threshold_block: f64) -> Decision {
    if p_spam < threshold_allow {
        Decision::Allow
    } else if p_spam >= threshold_block {
        Decision::Block
    } else {
        Decision::PendingReview
    }
}

/// Runs one message through the active classifier and persists the
/// outcome.
pub struct ScoringService {
    store: Arc<dyn Store>,
    classifier: Arc<dyn Classifier>,
    next_prediction_id: AtomicU64,
    observer: Arc<dyn Observer>,
}

impl ScoringService {
    pub fn new(
        store: Arc<dyn Store>,
        classifier: Arc<dyn Classifier>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        ScoringService {
            store,
            classifier,
            next_prediction_id: AtomicU64::new(1),
            observer,
        }
    }

    /// `ScoreMessage` (`spec.md` §4.4): scores a `Processing` message,
    /// records the prediction, and transitions it to its terminal status
    /// (or to `PendingReview`). Fails with `NotReady` if no model version
    /// is active, leaving the message `Processing` for a future retry.
    pub async fn score_message(&self, message_id: MessageId) -> AppResult<ScoringResult> {
        let settings = self.store.get_settings().await?;
        let active_id = settings
            .active_model_version
            .ok_or_else(|| AppError::NotReady("no active model version".to_string()))?;

        let message = self.store.get_message(message_id).await?;
        if message.status != MessageStatus::Processing {
            return Err(AppError::InvalidState(format!(
                "message {message_id} is not in Processing status"
            )));
        }

        let p_spam = self.classifier.predict(&message.text).await?;
        let decision = decide(p_spam, settings.threshold_allow, settings.threshold_block);

        let prediction = Prediction {
            id: self.next_prediction_id.fetch_add(1, Ordering::SeqCst),
            message_id,
            model_version_id: active_id,
            p_spam,
            decision,
            created_at: Utc::now(),
        };
        self.store.insert_prediction(prediction).await?;

        let new_status = match decision {
            Decision::Allow => MessageStatus::InInbox,
            Decision::Block => MessageStatus::InSpam,
            Decision::PendingReview => MessageStatus::PendingReview,
        };

        let mut updated: Message = message;
        updated.status = new_status;
        updated.last_model_version = Some(active_id);
        let true_label = updated.true_label;
        let text = updated.text.clone();
        self.store.update_message(updated).await?;

        let result = ScoringResult {
            message_id,
            model_version_id: active_id,
            text,
            p_spam,
            decision,
            new_status,
            true_label,
            is_correct: is_correct(decision, true_label),
        };
        self.observer.on_scored(&result).await;
        Ok(result)
    }
}

/// Derives whether a scored message's decision matched its gold label, per
/// `spec.md` §4.6: `true` when `Allow` meets `Ham` or `Block` meets `Spam`,
/// `None` (undecided) whenever `decision == PendingReview`, `false`
/// otherwise — including when there is no gold label to compare against.
pub fn is_correct(decision: Decision, true_label: Option<Label>) -> Option<bool> {
    match decision {
        Decision::PendingReview => None,
        Decision::Allow => Some(true_label == Some(Label::Ham)),
        Decision::Block => Some(true_label == Some(Label::Spam)),
    }
}
