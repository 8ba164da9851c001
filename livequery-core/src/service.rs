//! The remote service contract.
//!
//! A remote service is one named collection on the server. The cache only
//! needs `find` and the event subscription; the rest are passed through.

use crate::error::TransportResult;
use crate::query::{FindPage, Query};
use crate::record::{Record, RecordId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

/// Kind of mutation announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Patched,
    Removed,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Created,
        EventKind::Updated,
        EventKind::Patched,
        EventKind::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Patched => "patched",
            EventKind::Removed => "removed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation event for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub kind: EventKind,
    pub record: Record,
}

impl ServiceEvent {
    pub fn new(kind: EventKind, record: Record) -> Self {
        Self { kind, record }
    }

    pub fn created(record: Record) -> Self {
        Self::new(EventKind::Created, record)
    }

    pub fn updated(record: Record) -> Self {
        Self::new(EventKind::Updated, record)
    }

    pub fn patched(record: Record) -> Self {
        Self::new(EventKind::Patched, record)
    }

    pub fn removed(record: Record) -> Self {
        Self::new(EventKind::Removed, record)
    }
}

/// Receiving end of a service's event stream. Dropping it unsubscribes.
pub type EventReceiver = broadcast::Receiver<ServiceEvent>;

/// A remote collection exposed over the real-time RPC channel.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Collection name, used in logs and errors.
    fn name(&self) -> &str;

    /// Find records matching `query`.
    async fn find(&self, query: &Query) -> TransportResult<FindPage>;

    /// Get a record by identifier.
    async fn get(&self, id: &RecordId, query: &Query) -> TransportResult<Record>;

    /// Create a record.
    async fn create(&self, data: &Value, query: &Query) -> TransportResult<Record>;

    /// Replace a record.
    async fn update(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record>;

    /// Merge `data` into a record.
    async fn patch(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record>;

    /// Remove a record.
    async fn remove(&self, id: &RecordId, query: &Query) -> TransportResult<Record>;

    /// Subscribe to created/updated/patched/removed events of this collection.
    fn subscribe(&self) -> EventReceiver;
}
