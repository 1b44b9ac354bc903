//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the agent runtime returns [`AppError`]. The
//! variants mirror the error kinds a runner needs to police its own
//! behavior: retry, skip, surface, or unwind. `thiserror` is already part of
//! the dependency stack; this is where it earns its keep.

use thiserror::Error;

/// Unified error kind for store, classifier, and service operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Scoring requested but no classifier version is active.
    #[error("not ready: {0}")]
    NotReady(String),

    /// A referenced entity (message, review, model version) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness invariant would be violated (duplicate review, racing
    /// activation).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller supplied invalid input (empty text, bad threshold, unknown
    /// template).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation was requested in a state that forbids it (training with
    /// an empty training set).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The classifier capability failed to train.
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// A retryable infrastructure failure (storage, I/O).
    #[error("transient error: {0}")]
    Transient(String),

    /// The operation was cancelled before completion.
    #[error("cancelled")]
    Cancelled,
}

impl AppError {
    /// Whether a runner should simply retry the whole tick after a short
    /// sleep, per `spec.md` §7's policy table.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// Whether this error should never be logged as an infrastructure fault
    /// (caller-supplied bad input).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, AppError::InvalidInput(_))
    }
}

/// Result alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;
