//! External audit sink and the fire-and-forget dispatcher in front of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::audit::AuditEntry;
use crate::error::{Error, Result, StoreError};

/// Default number of events buffered ahead of the sink.
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 256;

const RESOURCE_TYPE_SESSION: &str = "session";
const RESOURCE_TYPE_USER: &str = "user";

/// Event shipped to the external audit sink.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuditEvent {
    /// Event category, e.g. `"access_control"`.
    pub event_type: String,
    /// Subject user id.
    pub user_id: String,
    /// Affected resource id.
    pub resource_id: Option<String>,
    /// Kind of the affected resource.
    pub resource_type: String,
    /// Action performed.
    pub action: String,
    /// Whether the action succeeded.
    pub success: bool,
    /// Additional key/value context.
    pub metadata: BTreeMap<String, String>,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Builds an access-control event from a log entry.
    pub fn from_entry(entry: &AuditEntry) -> Self {
        let (resource_id, resource_type) = match &entry.resource_id {
            Some(session) => (Some(session.to_string()), RESOURCE_TYPE_SESSION),
            None => (Some(entry.user_id.to_string()), RESOURCE_TYPE_USER),
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("role".to_string(), entry.role.to_string());
        metadata.insert(
            "capability_tier".to_string(),
            entry.capability_tier.to_string(),
        );
        if let Some(details) = &entry.details {
            metadata.insert("details".to_string(), details.clone());
        }

        Self {
            event_type: "access_control".to_string(),
            user_id: entry.user_id.to_string(),
            resource_id,
            resource_type: resource_type.to_string(),
            action: entry.action.clone(),
            success: entry.success,
            metadata,
            timestamp: entry.timestamp,
        }
    }
}

/// Durable audit destination.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    async fn audit(&self, event: &AuditEvent) -> std::result::Result<(), StoreError>;
}

/// Sink that emits each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn audit(&self, event: &AuditEvent) -> std::result::Result<(), StoreError> {
        info!(
            target: "rs_session_role::audit",
            event_type = %event.event_type,
            user_id = %event.user_id,
            resource_id = event.resource_id.as_deref().unwrap_or(""),
            resource_type = %event.resource_type,
            action = %event.action,
            success = event.success,
            metadata = ?event.metadata,
            "audit event"
        );
        Ok(())
    }
}

/// Non-blocking front for an [`AuditSink`].
///
/// Events go through a bounded queue drained by a single background task.
/// When the queue is full the event is dropped and a warning is logged; the
/// caller never waits on the sink.
#[derive(Debug, Clone, Default)]
pub struct AuditDispatcher {
    tx: Option<mpsc::Sender<AuditEvent>>,
}

impl AuditDispatcher {
    /// Creates a dispatcher that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Spawns the background consumer on the current tokio runtime.
    pub fn spawn<K>(sink: K, queue_capacity: usize) -> Result<Self>
    where
        K: AuditSink + 'static,
    {
        if queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "audit queue capacity must be > 0".to_string(),
            ));
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::InvalidConfig("audit sink requires a running tokio runtime".to_string())
        })?;

        let (tx, rx) = mpsc::channel(queue_capacity);
        handle.spawn(drain(Arc::new(sink), rx));
        Ok(Self { tx: Some(tx) })
    }

    /// Returns whether events are forwarded to a sink.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queues an event without waiting. Returns whether it was accepted.
    pub fn dispatch(&self, event: AuditEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    user_id = %event.user_id,
                    action = %event.action,
                    "audit queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    user_id = %event.user_id,
                    action = %event.action,
                    "audit consumer stopped, dropping event"
                );
                false
            }
        }
    }
}

async fn drain(sink: Arc<dyn AuditSink>, mut rx: mpsc::Receiver<AuditEvent>) {
    while let Some(event) = rx.recv().await {
        if let Err(error) = sink.audit(&event).await {
            warn!(
                error = %error,
                user_id = %event.user_id,
                action = %event.action,
                "audit sink write failed"
            );
        }
    }
    debug!("audit dispatcher closed");
}
