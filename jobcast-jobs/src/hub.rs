//! In-process connection hub.
//!
//! Each registered session gets an unbounded channel; the transport task that
//! owns the connection (a WebSocket, for instance) drains the receiver and
//! writes to the wire. When the transport goes away the receiver is dropped,
//! later sends fail, and the transport is expected to call
//! [`SessionHub::disconnect`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::broadcast::{Observer, ObserverHub, PushMessage};
use crate::error::DeliveryError;

pub type SessionId = u64;

/// Who is behind a connection, as established by the upstream auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverIdentity {
    pub user: Option<String>,
    pub capabilities: BTreeSet<String>,
}

impl ObserverIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user<I, S>(user: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user: Some(user.into()),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

struct Session {
    identity: ObserverIdentity,
    tx: mpsc::UnboundedSender<PushMessage>,
}

#[async_trait]
impl Observer for Session {
    fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.identity.capabilities.contains(capability)
    }

    async fn send(&self, message: &PushMessage) -> Result<(), DeliveryError> {
        self.tx
            .send(message.clone())
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Registry of the sessions connected to this process.
#[derive(Clone, Default)]
pub struct SessionHub {
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session and return its id with the receiving end of its queue.
    pub fn register(
        &self,
        identity: ObserverIdentity,
    ) -> (SessionId, mpsc::UnboundedReceiver<PushMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!(
            session_id = id,
            authenticated = identity.is_authenticated(),
            "session registered"
        );
        self.sessions.insert(id, Arc::new(Session { identity, tx }));
        (id, rx)
    }

    /// Remove a session. Returns false if it was already gone.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::debug!(session_id = id, "session disconnected");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl ObserverHub for SessionHub {
    fn observers(&self) -> Vec<Arc<dyn Observer>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn Observer>)
            .collect()
    }
}
