//! The scoring agent runner (`spec.md` §4.7).

use std::sync::Arc;

use tracing::{error, warn};

use crate::agents::cancellation::CancellationToken;
use crate::config::ScoringDelays;
use crate::error::AppError;
use crate::queue::QueueService;
use crate::scoring::ScoringService;
use crate::store::Store;

/// Long-running adaptive loop: claim → score → emit, with no shared
/// mutable handle carried across iterations beyond the services
/// themselves — each tick is scoped independently, per `spec.md` §5.
pub struct ScoringRunner {
    store: Arc<dyn Store>,
    queue: Arc<QueueService>,
    scoring: Arc<ScoringService>,
    delays: ScoringDelays,
}

impl ScoringRunner {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<QueueService>,
        scoring: Arc<ScoringService>,
        delays: ScoringDelays,
    ) -> Self {
        ScoringRunner {
            store,
            queue,
            scoring,
            delays,
        }
    }

    /// Runs until `token` is cancelled. Never returns an error: every
    /// fallible step is caught, logged, and turned into a sleep-and-retry
    /// per the policy table in `spec.md` §7.
    pub async fn run(&self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }

            if let Err(e) = self.tick(&token).await {
                if matches!(e, AppError::Cancelled) {
                    return;
                }
            }

            if token.is_cancelled() {
                return;
            }
        }
    }

    async fn tick(&self, token: &CancellationToken) -> Result<(), AppError> {
        let settings = match self.store.get_settings().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "scoring runner: settings read failed");
                token.sleep_or_cancel(self.delays.error()).await;
                return Ok(());
            }
        };

        if settings.active_model_version.is_none() {
            token.sleep_or_cancel(self.delays.not_ready()).await;
            return Ok(());
        }

        let claimed = match self.queue.claim_next().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "scoring runner: claim failed");
                token.sleep_or_cancel(self.delays.error()).await;
                return Ok(());
            }
        };

        let message = match claimed {
            Some(m) => m,
            None => {
                token.sleep_or_cancel(self.delays.idle()).await;
                return Ok(());
            }
        };

        match self.scoring.score_message(message.id).await {
            Ok(_result) => {
                token.sleep_or_cancel(self.delays.busy()).await;
            }
            Err(e) => {
                error!(error = %e, message_id = %message.id, "scoring runner: score failed");
                token.sleep_or_cancel(self.delays.error()).await;
            }
        }

        Ok(())
    }
}
