//! Fan-out of job broadcasts between workers.
//!
//! [`LocalCluster`] plays the coordinator: every submission is forwarded to
//! all workers except the one that sent it. Each worker runs a relay task that
//! hands incoming messages to its own [`BroadcastEmitter::relay`].

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broadcast::{BroadcastEmitter, ClusterChannel, ClusterMessage};
use crate::error::DeliveryError;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Envelope {
    origin: String,
    message: ClusterMessage,
}

/// Coordinator shared by every worker of one deployment.
#[derive(Clone)]
pub struct LocalCluster {
    tx: broadcast::Sender<Envelope>,
}

impl fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCluster")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCluster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how far a slow worker may lag before it skips messages.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Handle for one worker, identified by `worker_id`.
    pub fn worker(&self, worker_id: impl Into<String>) -> ClusterWorker {
        ClusterWorker {
            worker_id: worker_id.into(),
            tx: self.tx.clone(),
        }
    }
}

/// A worker's connection to the coordinator.
#[derive(Clone)]
pub struct ClusterWorker {
    worker_id: String,
    tx: broadcast::Sender<Envelope>,
}

impl fmt::Debug for ClusterWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterWorker")
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

impl ClusterWorker {
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Start relaying messages from sibling workers to `emitter`.
    ///
    /// The subscription is taken before this returns, so anything submitted
    /// afterwards is seen by the task.
    pub fn spawn_relay(&self, emitter: BroadcastEmitter) -> JoinHandle<()> {
        let mut rx = self.tx.subscribe();
        let worker_id = self.worker_id.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) if envelope.origin == worker_id => continue,
                    Ok(envelope) => {
                        emitter.relay(&envelope.message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(worker_id = %worker_id, skipped, "cluster relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(worker_id = %worker_id, "cluster closed, relay stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ClusterChannel for ClusterWorker {
    async fn submit(&self, message: ClusterMessage) -> Result<(), DeliveryError> {
        let envelope = Envelope {
            origin: self.worker_id.clone(),
            message,
        };
        // No subscribers means no relay task is running anywhere yet.
        if self.tx.send(envelope).is_err() {
            debug!(worker_id = %self.worker_id, "no workers listening on cluster");
        }
        Ok(())
    }
}
