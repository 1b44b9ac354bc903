//! Cooperative cancellation for long-running runners.
//!
//! Generalizes the teacher's `AbortHandle`-keyed `active_tasks` map from
//! `core/runner.rs::AgentGraphPy::spawn_task`/`kill_task`. That map exists
//! because Python callers look tasks up by string id; this crate has no
//! such caller, so each runner is simply handed its own token rather than
//! tracked externally by id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A shared, cloneable cancellation flag plus a wakeup for sleepers.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signals cancellation and immediately wakes any in-progress sleep.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first, in which case it
    /// returns immediately. Per `spec.md` §5: "a cancelled delay
    /// terminates immediately."
    pub async fn sleep_or_cancel(&self, duration: Duration) {
        if self.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.notify.notified() => {}
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
