//! Typed, defaulted configuration for the agent runtime.
//!
//! Follows the teacher's `CogOpsConfig` shape: one umbrella struct composed
//! of small per-concern sub-configs, each with sane defaults, loadable from
//! the environment the way `core/runner.rs` reads `MODEL_API_KEY`.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Scoring decision thresholds seeded into `SystemSettings` at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub default_allow: f64,
    pub default_block: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            default_allow: 0.30,
            default_block: 0.70,
        }
    }
}

/// Delays governing the scoring agent's adaptive loop (`spec.md` §4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringDelays {
    pub not_ready_ms: u64,
    pub idle_ms: u64,
    pub busy_ms: u64,
    pub error_ms: u64,
}

impl Default for ScoringDelays {
    fn default() -> Self {
        ScoringDelays {
            not_ready_ms: 2000,
            idle_ms: 500,
            busy_ms: 100,
            error_ms: 1000,
        }
    }
}

impl ScoringDelays {
    pub fn not_ready(&self) -> Duration {
        Duration::from_millis(self.not_ready_ms)
    }
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
    pub fn busy(&self) -> Duration {
        Duration::from_millis(self.busy_ms)
    }
    pub fn error(&self) -> Duration {
        Duration::from_millis(self.error_ms)
    }
}

/// Pacing for the retrain agent's periodic tick (`spec.md` §4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrainConfig {
    pub default_gold_threshold: u64,
    pub check_interval_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        RetrainConfig {
            default_gold_threshold: 100,
            check_interval_ms: 10_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl RetrainConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// The optional feeder that periodically calls `EnqueueFromValidation`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub batch_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            enabled: false,
            interval_ms: 5_000,
            batch_size: 5,
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Top-level runtime configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub models_directory: String,
    pub dataset_path: String,
    pub thresholds: ThresholdConfig,
    pub retrain: RetrainConfig,
    pub scoring_delays: ScoringDelays,
    pub simulator: SimulatorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            models_directory: "models".to_string(),
            dataset_path: "Dataset/SMSSpamCollection".to_string(),
            thresholds: ThresholdConfig::default(),
            retrain: RetrainConfig::default(),
            scoring_delays: ScoringDelays::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layers environment overrides on top of the defaults. Unset variables
    /// leave the default untouched, the same permissive pattern
    /// `core/runner.rs` uses for `MODEL_BASE_URL`.
    pub fn from_env() -> Self {
        let mut cfg = AppConfig::default();

        if let Ok(dir) = env::var("SPAMSHIELD_MODELS_DIR") {
            cfg.models_directory = dir;
        }
        if let Ok(path) = env::var("SPAMSHIELD_DATASET_PATH") {
            cfg.dataset_path = path;
        }
        if let Ok(v) = env::var("SPAMSHIELD_THRESHOLD_ALLOW") {
            if let Ok(parsed) = v.parse() {
                cfg.thresholds.default_allow = parsed;
            }
        }
        if let Ok(v) = env::var("SPAMSHIELD_THRESHOLD_BLOCK") {
            if let Ok(parsed) = v.parse() {
                cfg.thresholds.default_block = parsed;
            }
        }
        if let Ok(v) = env::var("SPAMSHIELD_RETRAIN_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                cfg.retrain.default_gold_threshold = parsed;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.thresholds.default_allow, 0.30);
        assert_eq!(cfg.thresholds.default_block, 0.70);
        assert_eq!(cfg.retrain.default_gold_threshold, 100);
        assert_eq!(cfg.scoring_delays.not_ready_ms, 2000);
        assert_eq!(cfg.scoring_delays.idle_ms, 500);
        assert_eq!(cfg.scoring_delays.busy_ms, 100);
        assert_eq!(cfg.scoring_delays.error_ms, 1000);
        assert_eq!(cfg.retrain.check_interval_ms, 10_000);
        assert_eq!(cfg.retrain.error_backoff_ms, 5_000);
    }

    #[test]
    fn env_override_parses_thresholds() {
        env::set_var("SPAMSHIELD_THRESHOLD_ALLOW", "0.2");
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.thresholds.default_allow, 0.2);
        env::remove_var("SPAMSHIELD_THRESHOLD_ALLOW");
    }
}
