//! Periodic retention sweep.

use std::time::Duration;

use jobcast_jobs::{JobError, JobRegistry};
use tokio::task::JoinHandle;

/// Run one retention pass and log the outcome.
pub async fn run_retention_sweep(registry: &JobRegistry, retention_days: u32) -> Result<u64, JobError> {
    match registry.cleanup_old_jobs(retention_days).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, retention_days, "retention sweep removed old jobs");
            }
            Ok(deleted)
        }
        Err(error) => {
            tracing::error!(%error, "retention sweep failed");
            Err(error)
        }
    }
}

/// Spawn the background task sweeping old finished jobs every `every`.
///
/// The first pass runs immediately.
pub fn spawn_retention_sweep(
    registry: JobRegistry,
    retention_days: u32,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            // failures are logged and retried on the next tick
            let _ = run_retention_sweep(&registry, retention_days).await;
        }
    })
}
