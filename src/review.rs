//! The review service (`spec.md` §4.4).

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::store::{Label, Message, MessageId, MessageStatus, Review, Store};

pub struct ReviewService {
    store: Arc<dyn Store>,
}

/// Outcome of [`ReviewService::check_auto_retrain`].
#[derive(Debug, Clone, Copy)]
pub struct AutoRetrainCheck {
    pub should_trigger: bool,
    pub current: u64,
    pub threshold: u64,
}

impl ReviewService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        ReviewService { store }
    }

    /// `AddReview` (`spec.md` §4.4): records a moderator's gold label,
    /// moves the message to its terminal status, and bumps the retrain
    /// counter. Fails with `NotFound` if the message does not exist,
    /// `Conflict` if a review for it already exists, or `InvalidState` if
    /// the message isn't awaiting review — `spec.md` §3's lifecycle only
    /// allows `PendingReview -> {InInbox, InSpam}`.
    pub async fn add_review(
        &self,
        message_id: MessageId,
        label: Label,
        reviewed_by: &str,
        note: Option<String>,
    ) -> AppResult<Review> {
        let mut message = self.store.get_message(message_id).await?;

        if self
            .store
            .get_review_by_message(message_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "message {message_id} already has a review"
            )));
        }

        if message.status != MessageStatus::PendingReview {
            return Err(AppError::InvalidState(format!(
                "message {message_id} is not awaiting review (status {:?})",
                message.status
            )));
        }

        let review = Review {
            message_id,
            label,
            reviewed_by: reviewed_by.to_string(),
            reviewed_at: Utc::now(),
            note,
        };
        self.store.insert_review(review.clone()).await?;

        message.true_label = Some(label);
        message.status = if label.is_spam() {
            MessageStatus::InSpam
        } else {
            MessageStatus::InInbox
        };
        self.update_message(message).await?;

        self.store.increment_new_gold().await?;

        Ok(review)
    }

    async fn update_message(&self, message: Message) -> AppResult<()> {
        self.store.update_message(message).await
    }

    /// `CheckAutoRetrain` (`spec.md` §4.4): reports whether the retrain
    /// runner should fire, without itself invoking training. The caller
    /// decides whether to act synchronously or let the background retrain
    /// runner pick it up on its next tick.
    pub async fn check_auto_retrain(&self) -> AppResult<AutoRetrainCheck> {
        let settings = self.store.get_settings().await?;
        let should_trigger = settings.auto_retrain_enabled
            && settings.retrain_gold_threshold > 0
            && settings.new_gold_since_last_train >= settings.retrain_gold_threshold;

        Ok(AutoRetrainCheck {
            should_trigger,
            current: settings.new_gold_since_last_train,
            threshold: settings.retrain_gold_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::{MessageStatus, Source};

    async fn seed_message(store: &Arc<dyn Store>, status: MessageStatus) -> MessageId {
        let msg = Message {
            id: MessageId(0),
            text: "call now".to_string(),
            source: Source::Runtime,
            split: None,
            true_label: None,
            status,
            created_at: Utc::now(),
            last_model_version: None,
        };
        store.insert_message(msg).await.unwrap().id
    }

    #[tokio::test]
    async fn add_review_sets_terminal_status_and_bumps_counter() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let id = seed_message(&store, MessageStatus::PendingReview).await;
        let svc = ReviewService::new(store.clone());

        svc.add_review(id, Label::Spam, "mod1", None).await.unwrap();

        let msg = store.get_message(id).await.unwrap();
        assert_eq!(msg.status, MessageStatus::InSpam);
        assert_eq!(msg.true_label, Some(Label::Spam));

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.new_gold_since_last_train, 1);
    }

    #[tokio::test]
    async fn second_review_on_same_message_is_conflict() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let id = seed_message(&store, MessageStatus::PendingReview).await;
        let svc = ReviewService::new(store.clone());

        svc.add_review(id, Label::Ham, "mod1", None).await.unwrap();
        let err = svc
            .add_review(id, Label::Spam, "mod2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.new_gold_since_last_train, 1);
    }

    #[tokio::test]
    async fn add_review_rejects_a_message_not_awaiting_review() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let id = seed_message(&store, MessageStatus::Queued).await;
        let svc = ReviewService::new(store.clone());

        let err = svc
            .add_review(id, Label::Spam, "mod1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.new_gold_since_last_train, 0);
    }

    #[tokio::test]
    async fn auto_retrain_requires_enabled_and_threshold_crossed() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new((0.30, 0.70), 2));
        let svc = ReviewService::new(store.clone());
        store.set_auto_retrain_enabled(true).await.unwrap();

        let check = svc.check_auto_retrain().await.unwrap();
        assert!(!check.should_trigger);

        store.increment_new_gold().await.unwrap();
        store.increment_new_gold().await.unwrap();
        let check = svc.check_auto_retrain().await.unwrap();
        assert!(check.should_trigger);
    }
}
