//! Error types for job tracking and delivery.

use jobcast_store::{RecordId, StoreError};
use thiserror::Error;

use crate::types::JobStatus;

/// Errors returned by the registry and by job handle operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job: {0}")]
    Validation(String),

    #[error("cannot {operation} job {job_id} while it is {from}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        operation: &'static str,
    },

    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to serialize job payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored job record {record_id} is corrupt: {reason}")]
    CorruptRecord { record_id: RecordId, reason: String },
}

/// Failure delivering a message to one observer or to the cluster channel.
///
/// These never escape a broadcast; they are counted and logged.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("observer connection is closed")]
    Closed,

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("cluster channel unavailable: {0}")]
    ChannelUnavailable(String),
}
