//! Process-local content store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{NewRecord, RecordId, RecordQuery, StoredRecord};
use crate::ContentStore;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: RecordId,
    records: BTreeMap<RecordId, StoredRecord>,
}

impl MemoryState {
    /// Matching records, newest first (ties broken by higher id).
    fn matching<'a>(&'a self, query: &'a RecordQuery) -> impl Iterator<Item = &'a StoredRecord> {
        let mut hits: Vec<&StoredRecord> =
            self.records.values().filter(|r| query.matches(r)).collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        hits.into_iter()
    }
}

/// In-memory [`ContentStore`]. Cloning shares the same underlying records.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    state: Arc<RwLock<MemoryState>>,
}

impl fmt::Debug for MemoryContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContentStore")
            .field("state", &"<RwLock<MemoryState>>")
            .finish()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rewrite a record's creation time. Used to age records in retention tests.
    pub async fn backdate(
        &self,
        id: RecordId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.created_at = created_at;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn create_record(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;
        state.records.insert(
            id,
            StoredRecord {
                id,
                category: record.category,
                slug: record.slug,
                title: record.title,
                owner_id: record.owner_id,
                created_at: record.created_at,
                attributes: record.attributes,
            },
        );
        Ok(id)
    }

    async fn read_record(&self, id: RecordId) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn update_attributes(
        &self,
        id: RecordId,
        attributes: &[(String, String)],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        for (key, value) in attributes {
            record.attributes.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.state.write().await.records.remove(&id).is_some())
    }

    async fn find_records(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.state.read().await;
        let iter = state.matching(query).skip(query.offset);
        Ok(match query.limit {
            Some(limit) => iter.take(limit).cloned().collect(),
            None => iter.cloned().collect(),
        })
    }

    async fn find_record_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>, StoreError> {
        let state = self.state.read().await;
        let iter = state.matching(query).skip(query.offset).map(|r| r.id);
        Ok(match query.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for id in ids {
            if state.records.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count_records(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        let state = self.state.read().await;
        Ok(state.matching(query).count() as u64)
    }
}
