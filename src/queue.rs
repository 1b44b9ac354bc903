//! The durable message queue (`spec.md` §4.3).
//!
//! `QueueService` is a thin façade over [`Store`]: it never holds
//! in-memory queue state of its own, so every enqueue/claim is immediately
//! visible to every other holder of the same `Arc<dyn Store>` — the same
//! "no local state, storage is the source of truth" posture the teacher's
//! `AgentGraph` takes in `core/runner.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::store::{Message, MessageId, MessageStatus, Source, Split, Store};

/// Enqueues runtime and dataset-validation messages, and hands claimed
/// work to scorers.
pub struct QueueService {
    store: Arc<dyn Store>,
}

impl QueueService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        QueueService { store }
    }

    /// `Enqueue` (`spec.md` §4.3): admits one piece of free-form runtime
    /// text. Rejects blank text as `InvalidInput`.
    pub async fn enqueue(&self, text: &str) -> AppResult<Message> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput(
                "message text must not be blank".to_string(),
            ));
        }

        let message = Message {
            id: MessageId(0),
            text: trimmed.to_string(),
            source: Source::Runtime,
            split: None,
            true_label: None,
            status: MessageStatus::Queued,
            created_at: Utc::now(),
            last_model_version: None,
        };

        let inserted = self.store.insert_message(message).await?;
        debug!(message_id = %inserted.id, "enqueued runtime message");
        Ok(inserted)
    }

    /// `EnqueueFromValidation` (`spec.md` §4.9/§4.10): draws up to `count`
    /// untouched validation-holdout rows and copies each into a fresh
    /// runtime message, marking the source row `Scored` so it is never
    /// drawn twice. If every row has already been consumed, the pool is
    /// reset and the draw is retried exactly once. `copy_label` controls
    /// whether the gold `true_label` rides along on the runtime copy
    /// (useful for offline accuracy measurement) or is left blank for a
    /// blind draw.
    pub async fn enqueue_from_validation(
        &self,
        count: usize,
        copy_label: bool,
    ) -> AppResult<Vec<Message>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut untouched = self.untouched_validation_rows().await?;
        if untouched.is_empty() {
            self.reset_consumed_validation_rows().await?;
            untouched = self.untouched_validation_rows().await?;
            if untouched.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut rng = StdRng::from_entropy();
        untouched.shuffle(&mut rng);
        untouched.truncate(count);

        let mut enqueued = Vec::with_capacity(untouched.len());
        for source_row in untouched {
            let claimed = self
                .store
                .compare_and_set_message_status(
                    source_row.id,
                    MessageStatus::Dataset,
                    MessageStatus::Scored,
                )
                .await?;
            if !claimed {
                continue;
            }

            let runtime_copy = Message {
                id: MessageId(0),
                text: source_row.text.clone(),
                source: Source::Runtime,
                split: Some(Split::ValidationHoldout),
                true_label: if copy_label { source_row.true_label } else { None },
                status: MessageStatus::Queued,
                created_at: Utc::now(),
                last_model_version: None,
            };
            enqueued.push(self.store.insert_message(runtime_copy).await?);
        }

        info!(count = enqueued.len(), "enqueued validation-holdout batch");
        Ok(enqueued)
    }

    async fn untouched_validation_rows(&self) -> AppResult<Vec<Message>> {
        let candidates = self
            .store
            .list_messages_by_source_split(Source::Dataset, Some(Split::ValidationHoldout))
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|m| m.status == MessageStatus::Dataset)
            .collect())
    }

    async fn reset_consumed_validation_rows(&self) -> AppResult<()> {
        let candidates = self
            .store
            .list_messages_by_source_split(Source::Dataset, Some(Split::ValidationHoldout))
            .await?;
        for row in candidates {
            if row.status == MessageStatus::Scored {
                self.store
                    .compare_and_set_message_status(
                        row.id,
                        MessageStatus::Scored,
                        MessageStatus::Dataset,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// `ClaimNext` (`spec.md` §4.3): atomically claims the oldest `Queued`
    /// message by transitioning it to `Processing`. Returns `None` when the
    /// queue is empty rather than an error — an empty queue is an expected,
    /// routine condition for the scoring loop.
    pub async fn claim_next(&self) -> AppResult<Option<Message>> {
        let mut queued = self
            .store
            .list_messages_by_status(MessageStatus::Queued)
            .await?;
        queued.sort_by_key(|m| m.created_at);

        for candidate in queued {
            let claimed = self
                .store
                .compare_and_set_message_status(
                    candidate.id,
                    MessageStatus::Queued,
                    MessageStatus::Processing,
                )
                .await?;
            if claimed {
                return Ok(Some(self.store.get_message(candidate.id).await?));
            }
            // Lost the race to another scorer; try the next oldest.
        }

        Ok(None)
    }

    /// `Counts` (`spec.md` §6): per-status message counts for observability.
    pub async fn counts(&self) -> AppResult<HashMap<String, u64>> {
        self.store.counts_by_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> QueueService {
        QueueService::new(Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn enqueue_rejects_blank_text() {
        let svc = service();
        let err = svc.enqueue("   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn claim_next_is_fifo_and_exclusive() {
        let svc = service();
        svc.enqueue("first").await.unwrap();
        svc.enqueue("second").await.unwrap();

        let claimed = svc.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.text, "first");
        assert_eq!(claimed.status, MessageStatus::Processing);

        let next = svc.claim_next().await.unwrap().unwrap();
        assert_eq!(next.text, "second");
    }

    #[tokio::test]
    async fn claim_next_on_empty_queue_returns_none() {
        let svc = service();
        assert!(svc.claim_next().await.unwrap().is_none());
    }

    async fn seed_holdout_row(store: &Arc<dyn Store>, text: &str, label: crate::store::Label) {
        let row = Message {
            id: MessageId(0),
            text: text.to_string(),
            source: Source::Dataset,
            split: Some(Split::ValidationHoldout),
            true_label: Some(label),
            status: MessageStatus::Dataset,
            created_at: Utc::now(),
            last_model_version: None,
        };
        store.insert_message(row).await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_from_validation_copies_label_when_requested() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        seed_holdout_row(&store, "free prize winner", crate::store::Label::Spam).await;
        let svc = QueueService::new(store.clone());

        let batch = svc.enqueue_from_validation(1, true).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].true_label, Some(crate::store::Label::Spam));
    }

    #[tokio::test]
    async fn enqueue_from_validation_blanks_label_when_not_requested() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        seed_holdout_row(&store, "free prize winner", crate::store::Label::Spam).await;
        let svc = QueueService::new(store.clone());

        let batch = svc.enqueue_from_validation(1, false).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].true_label, None);
    }
}
