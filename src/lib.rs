//! spamshield-core — autonomous SMS spam classification agent runtime.
//!
//! A continuously running spam classification service organized as an
//! autonomous software agent: a durable message queue, a scoring agent
//! that applies a versioned classifier behind a three-zone decision
//! policy, and a retrain agent driven by accumulating moderator
//! corrections. See `DESIGN.md` for how each module traces back to its
//! origin in the crate this one grew out of.

pub mod agents;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod queue;
pub mod review;
pub mod scoring;
pub mod simulator;
pub mod store;
pub mod training;

use std::sync::Arc;

use crate::agents::cancellation::CancellationToken;
use crate::agents::retrain_runner::RetrainRunner;
use crate::agents::scoring_runner::ScoringRunner;
use crate::classifier::bow_logistic::BowLogisticClassifier;
use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::dataset::DatasetImporter;
use crate::events::{NullObserver, Observer};
use crate::queue::QueueService;
use crate::review::ReviewService;
use crate::scoring::ScoringService;
use crate::simulator::SimulatorRunner;
use crate::store::memory::MemoryStore;
use crate::store::{Store, TrainTemplate};
use crate::training::TrainingService;

/// Initializes the crate's `tracing` subscriber. Safe to call more than
/// once — later calls are no-ops.
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Wires together the store, classifier, and every service/runner into
/// one composed runtime, the way `AgentGraph::new`/`with_config` compose
/// a registry, pipeline, and shared runtime/client in the teacher crate.
pub struct SpamShieldApp {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub classifier: Arc<dyn Classifier>,
    pub queue: Arc<QueueService>,
    pub review: Arc<ReviewService>,
    pub training: Arc<TrainingService>,
    pub scoring: Arc<ScoringService>,
    pub importer: Arc<DatasetImporter>,
}

impl SpamShieldApp {
    /// Builds a runtime over a fresh in-memory store, seeding
    /// `SystemSettings` from `config`'s threshold/retrain defaults.
    pub fn new(config: AppConfig) -> Self {
        Self::with_observer(config, Arc::new(NullObserver))
    }

    pub fn with_observer(config: AppConfig, observer: Arc<dyn Observer>) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(
            (config.thresholds.default_allow, config.thresholds.default_block),
            config.retrain.default_gold_threshold,
        ));
        let classifier: Arc<dyn Classifier> = Arc::new(BowLogisticClassifier::new());

        let queue = Arc::new(QueueService::new(store.clone()));
        let review = Arc::new(ReviewService::new(store.clone()));
        let training = Arc::new(TrainingService::new(
            store.clone(),
            classifier.clone(),
            config.models_directory.clone(),
        ));
        let scoring = Arc::new(ScoringService::new(
            store.clone(),
            classifier.clone(),
            observer,
        ));
        let importer = Arc::new(DatasetImporter::new(store.clone()));

        SpamShieldApp {
            config,
            store,
            classifier,
            queue,
            review,
            training,
            scoring,
            importer,
        }
    }

    pub fn scoring_runner(&self) -> ScoringRunner {
        ScoringRunner::new(
            self.store.clone(),
            self.queue.clone(),
            self.scoring.clone(),
            self.config.scoring_delays.clone(),
        )
    }

    pub fn retrain_runner(&self, observer: Arc<dyn Observer>) -> RetrainRunner {
        RetrainRunner::new(
            self.review.clone(),
            self.training.clone(),
            observer,
            self.config.retrain.clone(),
            TrainTemplate::Medium,
        )
    }

    pub fn simulator_runner(&self) -> SimulatorRunner {
        SimulatorRunner::new(self.queue.clone(), self.config.simulator.clone())
    }

    pub fn new_cancellation_token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}
