//! The optional simulator feeder (`spec.md` §6, `SPEC_FULL.md` §4.10).
//!
//! Periodically draws from the validation holdout and re-enqueues it as
//! runtime traffic, letting the agent loop be exercised end-to-end
//! without an external HTTP/CLI producer. Shares the scoring runner's
//! loop shape exactly.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::cancellation::CancellationToken;
use crate::config::SimulatorConfig;
use crate::queue::QueueService;

pub struct SimulatorRunner {
    queue: Arc<QueueService>,
    config: SimulatorConfig,
}

impl SimulatorRunner {
    pub fn new(queue: Arc<QueueService>, config: SimulatorConfig) -> Self {
        SimulatorRunner { queue, config }
    }

    /// Runs until `token` is cancelled. A no-op loop (just sleeps) when
    /// the feeder is disabled in configuration, so callers can
    /// unconditionally spawn it.
    pub async fn run(&self, token: CancellationToken) {
        if !self.config.enabled {
            return;
        }

        loop {
            if token.is_cancelled() {
                return;
            }

            match self
                .queue
                .enqueue_from_validation(self.config.batch_size, true)
                .await
            {
                Ok(fed) => {
                    if !fed.is_empty() {
                        info!(count = fed.len(), "simulator fed validation-holdout batch");
                    }
                }
                Err(e) => warn!(error = %e, "simulator: enqueue_from_validation failed"),
            }

            if token.is_cancelled() {
                return;
            }
            token.sleep_or_cancel(self.config.interval()).await;
        }
    }
}
