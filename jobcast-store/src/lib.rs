//! Generic, schema-less content store.
//!
//! Records carry a handful of identity columns (category marker, slug, title,
//! owner, creation time) plus an open set of string key/value attributes.
//! Callers that need a new entity kind map it onto records and attributes
//! instead of adding tables.
//!
//! # Backends
//!
//! - [`SqlContentStore`] - SQLite-backed store over a shared pool
//! - [`MemoryContentStore`] - process-local store for tests and embedding

mod error;
mod memory;
mod sql;
mod types;

pub use error::StoreError;
pub use memory::MemoryContentStore;
pub use sql::SqlContentStore;
pub use types::{
    format_timestamp, parse_timestamp, AttributeFilter, NewRecord, RecordId, RecordQuery,
    StoredRecord,
};

pub use async_trait::async_trait;

/// Operations the job tracker needs from a content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a record with its initial attributes and return its storage id.
    async fn create_record(&self, record: NewRecord) -> Result<RecordId, StoreError>;

    /// Read a record and its attributes. Unknown ids yield `Ok(None)`.
    async fn read_record(&self, id: RecordId) -> Result<Option<StoredRecord>, StoreError>;

    /// Insert or overwrite several attributes of an existing record.
    ///
    /// Fails with [`StoreError::NotFound`] if the record does not exist.
    async fn update_attributes(
        &self,
        id: RecordId,
        attributes: &[(String, String)],
    ) -> Result<(), StoreError>;

    /// Insert or overwrite a single attribute.
    async fn update_attribute(
        &self,
        id: RecordId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.update_attributes(id, &[(key.to_owned(), value.to_owned())])
            .await
    }

    /// Delete a record and its attributes. Returns whether anything was removed.
    async fn delete_record(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Delete several records. Returns how many existed.
    async fn delete_records(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut removed = 0;
        for id in ids {
            if self.delete_record(*id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Find records matching the query, newest first, honouring limit/offset.
    async fn find_records(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError>;

    /// Ids of the records `find_records` would return, without their attributes.
    async fn find_record_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>, StoreError>;

    /// Count records matching the query, ignoring limit/offset.
    async fn count_records(&self, query: &RecordQuery) -> Result<u64, StoreError>;
}
