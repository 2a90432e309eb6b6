//! Real-time delivery of job snapshots.
//!
//! The emitter pushes every snapshot to the local observers allowed to see it
//! and hands a copy to the cluster channel so sibling workers can do the same
//! for their own observers. Delivery is best effort: failures are counted and
//! logged, never returned to the caller.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::types::JobSnapshot;

/// Capabilities that entitle an observer to job updates.
pub const DEFAULT_DELIVERY_CAPABILITIES: [&str; 2] = ["manage_jobs", "read_job"];

/// Message pushed to connected observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushMessage {
    JobUpdate { job: JobSnapshot },
}

impl PushMessage {
    pub fn job(&self) -> &JobSnapshot {
        match self {
            Self::JobUpdate { job } => job,
        }
    }
}

/// Message exchanged between worker processes through the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterMessage {
    JobBroadcast {
        #[serde(rename = "jobData")]
        job_data: JobSnapshot,
    },
}

impl ClusterMessage {
    pub fn job(&self) -> &JobSnapshot {
        match self {
            Self::JobBroadcast { job_data } => job_data,
        }
    }
}

/// A connected party that may receive pushed messages.
#[async_trait]
pub trait Observer: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn has_capability(&self, capability: &str) -> bool;

    async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError>;
}

/// Source of the observers currently connected to this process.
pub trait ObserverHub: Send + Sync {
    fn observers(&self) -> Vec<Arc<dyn Observer>>;
}

/// Channel to the coordinating process that fans messages out to siblings.
#[async_trait]
pub trait ClusterChannel: Send + Sync {
    async fn submit(&self, message: ClusterMessage) -> Result<(), DeliveryError>;
}

/// Channel for single-process deployments; submissions go nowhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedChannel;

#[async_trait]
impl ClusterChannel for DetachedChannel {
    async fn submit(&self, _message: ClusterMessage) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Observers the message was handed to.
    pub delivered: usize,
    /// Observers not entitled to the message.
    pub skipped: usize,
    /// Entitled observers whose send failed.
    pub failed: usize,
    /// Whether the cluster channel accepted the message.
    pub relayed: bool,
}

#[derive(Clone)]
pub struct BroadcastEmitter {
    hub: Arc<dyn ObserverHub>,
    channel: Arc<dyn ClusterChannel>,
    capabilities: Arc<[String]>,
}

impl fmt::Debug for BroadcastEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastEmitter")
            .field("hub", &"<dyn ObserverHub>")
            .field("channel", &"<dyn ClusterChannel>")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl BroadcastEmitter {
    pub fn new(hub: Arc<dyn ObserverHub>, channel: Arc<dyn ClusterChannel>) -> Self {
        Self {
            hub,
            channel,
            capabilities: DEFAULT_DELIVERY_CAPABILITIES
                .iter()
                .map(|c| (*c).to_owned())
                .collect(),
        }
    }

    /// Replace the capability set that grants access to job updates.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Authenticated and holding at least one delivery capability.
    pub fn is_entitled(&self, observer: &dyn Observer) -> bool {
        observer.is_authenticated()
            && self
                .capabilities
                .iter()
                .any(|capability| observer.has_capability(capability))
    }

    /// Push a snapshot to local observers and submit it to the cluster.
    pub async fn broadcast(&self, job: &JobSnapshot) -> DeliveryReport {
        let mut report = self.deliver_local(job).await;

        let message = ClusterMessage::JobBroadcast {
            job_data: job.clone(),
        };
        match self.channel.submit(message).await {
            Ok(()) => report.relayed = true,
            Err(err) => warn!(job_id = %job.job_id, error = %err, "cluster submission failed"),
        }

        debug!(
            job_id = %job.job_id,
            status = %job.status,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            relayed = report.relayed,
            "job update broadcast"
        );
        report
    }

    /// Deliver a message received from a sibling worker to local observers.
    ///
    /// Relayed messages are never resubmitted to the cluster channel.
    pub async fn relay(&self, message: &ClusterMessage) -> DeliveryReport {
        let report = self.deliver_local(message.job()).await;
        debug!(
            job_id = %message.job().job_id,
            delivered = report.delivered,
            failed = report.failed,
            "relayed job update"
        );
        report
    }

    async fn deliver_local(&self, job: &JobSnapshot) -> DeliveryReport {
        let message = PushMessage::JobUpdate { job: job.clone() };
        let mut report = DeliveryReport::default();

        for observer in self.hub.observers() {
            if !self.is_entitled(observer.as_ref()) {
                report.skipped += 1;
                continue;
            }
            match observer.send(&message).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    debug!(job_id = %job.job_id, error = %err, "observer delivery failed");
                }
            }
        }

        report
    }
}
