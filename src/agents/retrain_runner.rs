//! The retrain agent runner (`spec.md` §4.8).

use std::sync::Arc;

use tracing::{error, info};

use crate::agents::cancellation::CancellationToken;
use crate::config::RetrainConfig;
use crate::events::{Observer, RetrainResult};
use crate::review::ReviewService;
use crate::store::TrainTemplate;
use crate::training::TrainingService;

/// Long-running periodic loop: read counter → decide → train+activate.
pub struct RetrainRunner {
    review: Arc<ReviewService>,
    training: Arc<TrainingService>,
    observer: Arc<dyn Observer>,
    config: RetrainConfig,
    default_template: TrainTemplate,
}

impl RetrainRunner {
    pub fn new(
        review: Arc<ReviewService>,
        training: Arc<TrainingService>,
        observer: Arc<dyn Observer>,
        config: RetrainConfig,
        default_template: TrainTemplate,
    ) -> Self {
        RetrainRunner {
            review,
            training,
            observer,
            config,
            default_template,
        }
    }

    pub async fn run(&self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let delay = if self.tick().await {
                self.config.check_interval()
            } else {
                self.config.error_backoff()
            };
            if token.is_cancelled() {
                return;
            }
            token.sleep_or_cancel(delay).await;
        }
    }

    /// One tick: skip, or train+activate and report. Returns `false` when
    /// the tick attempted training and it failed, in which case the
    /// caller backs off `ErrorBackoff` instead of `CheckInterval` before
    /// the next tick. The gold counter is not reset on failure — that is
    /// `TrainingService`'s job on success only. Public so operators (and
    /// tests) can drive exactly one iteration without waiting on `run`'s
    /// internal sleep.
    pub async fn tick(&self) -> bool {
        let check = match self.review.check_auto_retrain().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "retrain runner: settings read failed");
                return false;
            }
        };

        if !check.should_trigger {
            return true;
        }

        match self
            .training
            .train_model(self.default_template, true)
            .await
        {
            Ok(result) => {
                info!(
                    version = result.model_version.version,
                    activated = result.activated,
                    "retrain tick: training succeeded"
                );
                self.observer
                    .on_retrained(&RetrainResult {
                        new_model_version_id: result.model_version.id,
                        activated: result.activated,
                    })
                    .await;
                true
            }
            Err(e) => {
                error!(error = %e, "retrain tick: training failed");
                false
            }
        }
    }

    /// `ForceRetrain` (`spec.md` §4.8): bypasses the counter check and
    /// always trains; shares the same training path as the periodic tick.
    pub async fn force_retrain(
        &self,
        template: TrainTemplate,
        activate: bool,
    ) -> crate::error::AppResult<crate::training::TrainResult> {
        let result = self.training.train_model(template, activate).await?;
        self.observer
            .on_retrained(&RetrainResult {
                new_model_version_id: result.model_version.id,
                activated: result.activated,
            })
            .await;
        Ok(result)
    }
}
