//! Live handle to one job.

use std::fmt;
use std::sync::Arc;

use jobcast_store::ContentStore;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::broadcast::BroadcastEmitter;
use crate::cache::{ActiveJobCache, JobCell};
use crate::error::JobError;
use crate::mapper;
use crate::types::{now, JobSnapshot, JobStatus};

/// Collaborators shared by the registry and every handle it gives out.
pub(crate) struct JobServices {
    pub store: Arc<dyn ContentStore>,
    pub emitter: BroadcastEmitter,
    pub cache: ActiveJobCache,
}

/// Handle through which a job's lifecycle is driven.
///
/// Every operation mutates the shared in-memory state, persists the changed
/// attributes and then broadcasts the full snapshot. Clones share state.
#[derive(Clone)]
pub struct Job {
    cell: Arc<JobCell>,
    services: Arc<JobServices>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("snapshot", &self.cell.snapshot())
            .finish()
    }
}

impl Job {
    pub(crate) fn new(cell: Arc<JobCell>, services: Arc<JobServices>) -> Self {
        Self { cell, services }
    }

    pub fn id(&self) -> String {
        self.cell.lock().snapshot.job_id.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.cell.lock().snapshot.status
    }

    pub fn progress(&self) -> u8 {
        self.cell.lock().snapshot.progress
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.cell.snapshot()
    }

    /// Move a pending job to running.
    pub async fn start(&self) -> Result<JobSnapshot, JobError> {
        self.apply("start", |job| {
            if job.status != JobStatus::Pending {
                return Err(invalid(job, "start"));
            }
            job.status = JobStatus::Running;
            job.started_at = Some(now());
            Ok(())
        })
        .await
    }

    /// Record progress, clamped to `0..=100`, and shallow-merge `metadata`.
    pub async fn update_progress(
        &self,
        progress: i64,
        metadata: Option<Map<String, Value>>,
    ) -> Result<JobSnapshot, JobError> {
        self.apply("update progress of", move |job| {
            ensure_active(job, "update progress of")?;
            job.progress = clamp_progress(progress);
            if let Some(patch) = metadata {
                job.metadata.extend(patch);
            }
            Ok(())
        })
        .await
    }

    /// Finish successfully. Progress is forced to 100.
    pub async fn complete(&self, result: Option<Value>) -> Result<JobSnapshot, JobError> {
        self.apply("complete", move |job| {
            ensure_active(job, "complete")?;
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(now());
            job.result = result;
            Ok(())
        })
        .await
    }

    /// Finish with an error. Progress is left where it was.
    pub async fn fail(&self, message: impl Into<String>) -> Result<JobSnapshot, JobError> {
        let message = message.into();
        self.apply("fail", move |job| {
            ensure_active(job, "fail")?;
            job.status = JobStatus::Failed;
            job.completed_at = Some(now());
            job.error_message = Some(message);
            Ok(())
        })
        .await
    }

    pub async fn cancel(&self) -> Result<JobSnapshot, JobError> {
        self.apply("cancel", |job| {
            ensure_active(job, "cancel")?;
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(now());
            Ok(())
        })
        .await
    }

    async fn apply<F>(&self, operation: &'static str, mutate: F) -> Result<JobSnapshot, JobError>
    where
        F: FnOnce(&mut JobSnapshot) -> Result<(), JobError>,
    {
        let (previous, updated, revision, persisted) = {
            let mut state = self.cell.lock();
            let mut next = state.snapshot.clone();
            mutate(&mut next)?;
            let previous = std::mem::replace(&mut state.snapshot, next.clone());
            state.revision += 1;
            (previous, next, state.revision, state.persisted.clone())
        };

        // diff against the stored state so an unreverted failed write is rewritten
        let changes = match mapper::changed_attributes(&persisted, &updated) {
            Ok(changes) => changes,
            Err(err) => {
                self.cell.revert(revision, previous);
                return Err(err);
            }
        };

        if !changes.is_empty() {
            if let Err(err) = self
                .services
                .store
                .update_attributes(updated.internal_id, &changes)
                .await
            {
                error!(
                    job_id = %updated.job_id,
                    operation,
                    error = %err,
                    "failed to persist job update"
                );
                if !self.cell.revert(revision, previous) {
                    warn!(
                        job_id = %updated.job_id,
                        operation,
                        "newer update landed, its write carries these fields"
                    );
                }
                return Err(err.into());
            }
        }
        self.cell.mark_persisted(revision, updated.clone());

        if updated.status.is_terminal() {
            self.services.cache.evict(&updated.job_id, &self.cell);
            info!(job_id = %updated.job_id, status = %updated.status, "job finished");
        }

        self.services.emitter.broadcast(&updated).await;
        Ok(updated)
    }
}

fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

fn invalid(job: &JobSnapshot, operation: &'static str) -> JobError {
    JobError::InvalidTransition {
        job_id: job.job_id.clone(),
        from: job.status,
        operation,
    }
}

fn ensure_active(job: &JobSnapshot, operation: &'static str) -> Result<(), JobError> {
    if job.status.is_terminal() {
        return Err(invalid(job, operation));
    }
    Ok(())
}
