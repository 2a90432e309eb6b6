#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jobcast_jobs::{
    async_trait, BroadcastEmitter, DetachedChannel, JobRegistry, ObserverIdentity, PushMessage,
    SessionHub,
};
use jobcast_store::{
    ContentStore, MemoryContentStore, NewRecord, RecordId, RecordQuery, StoreError, StoredRecord,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

#[derive(Default)]
struct WriteGate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

/// Memory store that yields before every lookup and whose attribute writes
/// can be switched off or held.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryContentStore,
    failing: Arc<AtomicBool>,
    gate: Arc<WriteGate>,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Park the next attribute write until [`FlakyStore::fail_held_write`].
    pub fn hold_next_write(&self) {
        self.gate.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the held write has reached the store.
    pub async fn write_held(&self) {
        self.gate.entered.notified().await;
    }

    pub fn fail_held_write(&self) {
        self.gate.release.notify_one();
    }
}

#[async_trait]
impl ContentStore for FlakyStore {
    async fn create_record(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        self.inner.create_record(record).await
    }

    async fn read_record(&self, id: RecordId) -> Result<Option<StoredRecord>, StoreError> {
        self.inner.read_record(id).await
    }

    async fn update_attributes(
        &self,
        id: RecordId,
        attributes: &[(String, String)],
    ) -> Result<(), StoreError> {
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
            return Err(StoreError::Unavailable("write timed out".into()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.update_attributes(id, attributes).await
    }

    async fn delete_record(&self, id: RecordId) -> Result<bool, StoreError> {
        self.inner.delete_record(id).await
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        self.inner.delete_records(ids).await
    }

    async fn find_records(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.find_records(query).await
    }

    async fn find_record_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.find_record_ids(query).await
    }

    async fn count_records(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        self.inner.count_records(query).await
    }
}

pub struct Harness {
    pub store: FlakyStore,
    pub hub: SessionHub,
    pub registry: JobRegistry,
}

impl Harness {
    pub fn new() -> Self {
        let store = FlakyStore::default();
        let hub = SessionHub::new();
        let emitter = BroadcastEmitter::new(Arc::new(hub.clone()), Arc::new(DetachedChannel));
        let registry = JobRegistry::new(Arc::new(store.clone()), emitter);
        Self {
            store,
            hub,
            registry,
        }
    }

    pub fn admin(&self) -> UnboundedReceiver<PushMessage> {
        self.hub
            .register(ObserverIdentity::user("admin", ["manage_jobs"]))
            .1
    }
}

pub fn drain(rx: &mut UnboundedReceiver<PushMessage>) -> Vec<PushMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}
