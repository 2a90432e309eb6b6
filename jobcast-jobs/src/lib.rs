//! Observable background jobs.
//!
//! Long-running work (imports, exports, backups, sync tasks) is tracked as a
//! [`Job`] with a strict lifecycle. State lives durably in a
//! [`ContentStore`](jobcast_store::ContentStore) and every change is pushed in
//! real time to the observers entitled to see it, on this worker and, through
//! a [`ClusterChannel`], on its siblings.
//!
//! ```text
//! pending ──start──▶ running ──complete──▶ completed
//!    │                  │ └────fail──────▶ failed
//!    └──────cancel──────┴─────cancel─────▶ cancelled
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobcast_jobs::{BroadcastEmitter, DetachedChannel, JobRegistry, JobSpec, SessionHub};
//! use jobcast_store::MemoryContentStore;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), jobcast_jobs::JobError> {
//! let hub = SessionHub::new();
//! let emitter = BroadcastEmitter::new(Arc::new(hub.clone()), Arc::new(DetachedChannel));
//! let registry = JobRegistry::new(Arc::new(MemoryContentStore::new()), emitter);
//!
//! let job = registry
//!     .create_job(JobSpec::new("Import posts", "plugin-a").with_type("import"))
//!     .await?;
//! job.start().await?;
//! job.update_progress(50, None).await?;
//! job.complete(Some(json!({ "itemsImported": 100 }))).await?;
//! # Ok(())
//! # }
//! ```

mod broadcast;
mod cache;
mod cluster;
mod error;
mod hub;
mod job;
pub mod mapper;
mod registry;
mod types;

pub use broadcast::{
    BroadcastEmitter, ClusterChannel, ClusterMessage, DeliveryReport, DetachedChannel, Observer,
    ObserverHub, PushMessage, DEFAULT_DELIVERY_CAPABILITIES,
};
pub use cluster::{ClusterWorker, LocalCluster};
pub use error::{DeliveryError, JobError};
pub use hub::{ObserverIdentity, SessionHub, SessionId};
pub use job::Job;
pub use registry::{JobRegistry, CLEANUP_BATCH};
pub use types::{JobFilter, JobSnapshot, JobSpec, JobStatus, DEFAULT_JOB_TYPE};

pub use async_trait::async_trait;
