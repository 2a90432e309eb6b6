//! Per-process index of live jobs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::types::JobSnapshot;

/// Shared in-memory state of one job.
///
/// The revision is bumped on every accepted mutation so a failed write can
/// tell whether its pre-mutation snapshot is still the latest one. `persisted`
/// is the newest snapshot known to be in the store; writes are diffed
/// against it so a failed write is carried by the next one.
#[derive(Debug)]
pub(crate) struct JobCell {
    state: Mutex<CellState>,
}

#[derive(Debug)]
pub(crate) struct CellState {
    pub snapshot: JobSnapshot,
    pub revision: u64,
    pub persisted: JobSnapshot,
    persisted_revision: u64,
}

impl JobCell {
    pub fn new(snapshot: JobSnapshot) -> Self {
        Self {
            state: Mutex::new(CellState {
                persisted: snapshot.clone(),
                snapshot,
                revision: 0,
                persisted_revision: 0,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, CellState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot.clone()
    }

    /// Record that the snapshot of `revision` reached the store.
    pub fn mark_persisted(&self, revision: u64, snapshot: JobSnapshot) {
        let mut state = self.lock();
        if revision > state.persisted_revision {
            state.persisted = snapshot;
            state.persisted_revision = revision;
        }
    }

    /// Replace the cell's state with a snapshot just read from the store.
    pub fn reload(&self, snapshot: JobSnapshot) {
        let mut state = self.lock();
        state.revision += 1;
        state.persisted_revision = state.revision;
        state.persisted = snapshot.clone();
        state.snapshot = snapshot;
    }

    /// Restore `previous` if nothing else changed the cell since `revision`.
    pub fn revert(&self, revision: u64, previous: JobSnapshot) -> bool {
        let mut state = self.lock();
        if state.revision != revision {
            return false;
        }
        state.snapshot = previous;
        state.revision += 1;
        true
    }
}

/// Jobs whose last known status in this process is pending or running.
#[derive(Debug, Default)]
pub(crate) struct ActiveJobCache {
    cells: DashMap<String, Arc<JobCell>>,
}

impl ActiveJobCache {
    pub fn insert(&self, job_id: String, cell: Arc<JobCell>) {
        self.cells.insert(job_id, cell);
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<JobCell>> {
        self.cells.get(job_id).map(|entry| Arc::clone(entry.value()))
    }

    /// The cached cell for `job_id`, inserting `make()` if there is none.
    /// The flag is true when the returned cell was just inserted.
    pub fn get_or_insert_with(
        &self,
        job_id: &str,
        make: impl FnOnce() -> Arc<JobCell>,
    ) -> (Arc<JobCell>, bool) {
        let mut inserted = false;
        let cell = self
            .cells
            .entry(job_id.to_owned())
            .or_insert_with(|| {
                inserted = true;
                make()
            })
            .value()
            .clone();
        (cell, inserted)
    }

    /// Drop the entry only if it still points at `cell`.
    pub fn evict(&self, job_id: &str, cell: &Arc<JobCell>) {
        self.cells
            .remove_if(job_id, |_, cached| Arc::ptr_eq(cached, cell));
    }

    #[cfg(test)]
    pub fn contains(&self, job_id: &str) -> bool {
        self.cells.contains_key(job_id)
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.cells.iter().map(|entry| entry.key().clone()).collect()
    }
}
