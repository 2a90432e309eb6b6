//! Entry point for creating, looking up and pruning jobs.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jobcast_store::ContentStore;
use serde_json::Map;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::BroadcastEmitter;
use crate::cache::{ActiveJobCache, JobCell};
use crate::error::JobError;
use crate::job::{Job, JobServices};
use crate::mapper;
use crate::types::{now, JobFilter, JobSnapshot, JobSpec, JobStatus, DEFAULT_JOB_TYPE};

/// Records removed per round trip by [`JobRegistry::cleanup_old_jobs`].
pub const CLEANUP_BATCH: usize = 500;

#[derive(Clone)]
pub struct JobRegistry {
    services: Arc<JobServices>,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("active_jobs", &self.services.cache.job_ids().len())
            .field("emitter", &self.services.emitter)
            .finish()
    }
}

impl JobRegistry {
    pub fn new(store: Arc<dyn ContentStore>, emitter: BroadcastEmitter) -> Self {
        Self {
            services: Arc::new(JobServices {
                store,
                emitter,
                cache: ActiveJobCache::default(),
            }),
        }
    }

    pub fn emitter(&self) -> &BroadcastEmitter {
        &self.services.emitter
    }

    /// Validate, persist, cache and announce a new pending job.
    pub async fn create_job(&self, spec: JobSpec) -> Result<Job, JobError> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(JobError::Validation("name is required".into()));
        }
        let source = spec.source.trim();
        if source.is_empty() {
            return Err(JobError::Validation("source is required".into()));
        }
        let job_type = spec
            .job_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_JOB_TYPE);

        let mut snapshot = JobSnapshot {
            job_id: Uuid::new_v4().to_string(),
            internal_id: 0,
            name: name.to_owned(),
            description: spec.description,
            job_type: job_type.to_owned(),
            source: source.to_owned(),
            status: JobStatus::Pending,
            progress: 0,
            metadata: spec.metadata.unwrap_or_else(Map::new),
            icon_svg: spec.icon_svg,
            created_at: now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            created_by: spec.created_by,
        };

        let record = mapper::to_new_record(&snapshot)?;
        snapshot.internal_id = self.services.store.create_record(record).await?;

        let cell = Arc::new(JobCell::new(snapshot.clone()));
        self.services
            .cache
            .insert(snapshot.job_id.clone(), Arc::clone(&cell));

        info!(
            job_id = %snapshot.job_id,
            job_type = %snapshot.job_type,
            source = %snapshot.source,
            "job created"
        );
        self.services.emitter.broadcast(&snapshot).await;

        Ok(Job::new(cell, Arc::clone(&self.services)))
    }

    /// Durable state of a job, or `None` if no such job exists.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobSnapshot>, JobError> {
        let records = self
            .services
            .store
            .find_records(&mapper::by_job_id(job_id))
            .await?;
        records.first().map(mapper::from_record).transpose()
    }

    /// Jobs matching `filter`, newest first. Unreadable records are skipped.
    pub async fn get_jobs(&self, filter: &JobFilter) -> Result<Vec<JobSnapshot>, JobError> {
        let records = self
            .services
            .store
            .find_records(&mapper::to_query(filter))
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| match mapper::from_record(record) {
                Ok(job) => Some(job),
                Err(err) => {
                    warn!(record_id = record.id, error = %err, "skipping unreadable job record");
                    None
                }
            })
            .collect())
    }

    /// Number of jobs matching `filter`, ignoring its limit and offset.
    pub async fn count_jobs(&self, filter: &JobFilter) -> Result<u64, JobError> {
        Ok(self
            .services
            .store
            .count_records(&mapper::to_query(filter))
            .await?)
    }

    /// Delete terminal jobs created more than `days_old` days ago.
    ///
    /// Pending and running jobs are kept regardless of age. Deletion runs in
    /// batches of [`CLEANUP_BATCH`] records.
    pub async fn cleanup_old_jobs(&self, days_old: u32) -> Result<u64, JobError> {
        let Some(cutoff) = retention_cutoff(days_old) else {
            debug!(days_old, "retention window reaches past the calendar, nothing to delete");
            return Ok(0);
        };
        let terminal = JobStatus::TERMINAL
            .iter()
            .map(|s| s.as_str().to_owned())
            .collect();
        let query = mapper::to_query(&JobFilter::default())
            .where_in(mapper::keys::STATUS, terminal)
            .created_before(cutoff)
            .limit(Some(CLEANUP_BATCH));

        let mut deleted = 0;
        loop {
            let ids = self.services.store.find_record_ids(&query).await?;
            if ids.is_empty() {
                break;
            }
            let removed = self.services.store.delete_records(&ids).await?;
            deleted += removed;
            if ids.len() < CLEANUP_BATCH || removed == 0 {
                break;
            }
        }

        info!(days_old, deleted, "old jobs cleaned up");
        Ok(deleted)
    }

    /// Live handle for a job this process is still tracking.
    pub fn active_job(&self, job_id: &str) -> Option<Job> {
        self.services
            .cache
            .get(job_id)
            .map(|cell| Job::new(cell, Arc::clone(&self.services)))
    }

    pub fn active_job_ids(&self) -> Vec<String> {
        self.services.cache.job_ids()
    }

    /// Handle for any stored job, e.g. one started before a restart.
    ///
    /// Jobs that are still pending or running join this process's cache.
    pub async fn attach_job(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        if let Some(job) = self.active_job(job_id) {
            return Ok(Some(job));
        }
        let Some(snapshot) = self.get_job(job_id).await? else {
            return Ok(None);
        };
        if !snapshot.status.is_active() {
            let cell = Arc::new(JobCell::new(snapshot));
            return Ok(Some(Job::new(cell, Arc::clone(&self.services))));
        }

        let (cell, inserted) = self
            .services
            .cache
            .get_or_insert_with(job_id, || Arc::new(JobCell::new(snapshot)));
        if inserted {
            // a handle may have finished the job between the read and the insert
            match self.get_job(job_id).await {
                Ok(Some(latest)) if latest.status.is_active() => {}
                Ok(Some(latest)) => {
                    cell.reload(latest);
                    self.services.cache.evict(job_id, &cell);
                }
                Ok(None) => {
                    self.services.cache.evict(job_id, &cell);
                    return Ok(None);
                }
                Err(err) => {
                    self.services.cache.evict(job_id, &cell);
                    return Err(err);
                }
            }
        }
        Ok(Some(Job::new(cell, Arc::clone(&self.services))))
    }
}

/// Oldest creation time a job may have and still be kept, or `None` when
/// the window starts before the earliest representable date.
fn retention_cutoff(days_old: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days_old)).and_then(|window| now().checked_sub_signed(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_cutoff_saturates_instead_of_overflowing() {
        let cutoff = retention_cutoff(30).expect("30 days fits");
        assert!(cutoff < Utc::now());
        assert!(retention_cutoff(u32::MAX).is_none());
    }
}
