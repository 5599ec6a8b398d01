//! Tracked background work: inbound event dispatch and detached webhook calls.
//!
//! Every task is spawned on one [`TaskTracker`] and observes one
//! [`CancellationToken`], so shutdown can drain in-flight work and then cancel
//! what is left. Task failures are logged here; they are never dropped.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    token: CancellationToken,
    failures: Arc<AtomicU64>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_logged<F, E>(&self, task: &'static str, correlation_id: String, work: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let token = self.token.clone();
        let failures = Arc::clone(&self.failures);

        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    warn!(
                        event_name = "system.background.cancelled",
                        task,
                        correlation_id = %correlation_id,
                        "background task cancelled before completion"
                    );
                }
                result = work => {
                    if let Err(error) = result {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(
                            event_name = "system.background.failed",
                            task,
                            correlation_id = %correlation_id,
                            error = %error,
                            "background task failed"
                        );
                    }
                }
            }
        });
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task spawned so far has finished. New tasks may
    /// still be spawned afterwards.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops accepting work, waits up to `grace` for in-flight tasks, then
    /// cancels the remainder.
    pub async fn shutdown(&self, grace: Duration) {
        self.tracker.close();
        let pending = self.tracker.len();
        info!(event_name = "system.background.draining", pending, "draining background tasks");

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                event_name = "system.background.grace_elapsed",
                pending = self.tracker.len(),
                "grace period elapsed; cancelling remaining background tasks"
            );
            self.token.cancel();
            self.tracker.wait().await;
        }
    }
}
