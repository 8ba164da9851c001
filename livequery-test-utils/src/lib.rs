//! livequery Test Utilities
//!
//! Shared test infrastructure for the livequery workspace:
//! - An in-memory `RemoteService` that pages, mutates and emits events
//! - Record fixtures and small assertion helpers
//! - Proptest generators for records and event sequences

pub use livequery_core::{
    CacheSettings, Channel, EventKind, FindPage, InsertionPolicy, Query, Record, RecordId,
    RemoteService, ServiceEvent, TransportError, TransportResult, ID_FIELD,
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

// ============================================================================
// MOCK SERVICE
// ============================================================================

/// In-memory remote collection for testing.
///
/// `find` honours `query.$skip`, `query.$limit` and plain equality filters.
/// CRUD calls mutate the store and broadcast the matching event, like a real
/// server would. `emit` broadcasts an event without touching the store.
pub struct MockService {
    name: String,
    page_size: AtomicU64,
    records: RwLock<Vec<Record>>,
    finds: Mutex<Vec<Query>>,
    failures: Mutex<VecDeque<TransportError>>,
    next_id: AtomicU64,
    events: broadcast::Sender<ServiceEvent>,
}

impl MockService {
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), Vec::new(), 10)
    }

    /// Service pre-populated with `records`, paging by `page_size`.
    pub fn with_records(name: impl Into<String>, records: Vec<Record>, page_size: u64) -> Arc<Self> {
        Arc::new(Self::build(name.into(), records, page_size))
    }

    fn build(name: String, records: Vec<Record>, page_size: u64) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            name,
            page_size: AtomicU64::new(page_size),
            records: RwLock::new(records),
            finds: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn set_page_size(&self, page_size: u64) {
        self.page_size.store(page_size, Ordering::SeqCst);
    }

    /// Replace the stored records without emitting events.
    pub async fn seed(&self, records: Vec<Record>) {
        *self.records.write().await = records;
    }

    pub async fn records(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    /// Make the next `find` fail with `error`.
    pub fn fail_next_find(&self, error: TransportError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Every query `find` was called with, oldest first.
    pub fn find_calls(&self) -> Vec<Query> {
        self.finds.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn find_count(&self) -> usize {
        self.finds.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Broadcast an event without changing the store.
    pub fn emit(&self, event: ServiceEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn not_found(&self, id: &RecordId) -> TransportError {
        TransportError::NotFound {
            service: self.name.clone(),
            id: id.to_string(),
        }
    }

    fn matches_filter(record: &Record, query: &Query) -> bool {
        let Some(filter) = query.filter() else {
            return true;
        };
        filter
            .iter()
            .filter(|(key, _)| !key.starts_with('$'))
            .all(|(key, expected)| record.get(key) == Some(expected))
    }
}

#[async_trait]
impl RemoteService for MockService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &Query) -> TransportResult<FindPage> {
        self.finds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }
        let records = self.records.read().await;
        let matching: Vec<&Record> = records
            .iter()
            .filter(|r| Self::matches_filter(r, query))
            .collect();
        let skip = query.skip().unwrap_or(0);
        let limit = query
            .limit()
            .unwrap_or_else(|| self.page_size.load(Ordering::SeqCst));
        let data = matching
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(|r| (*r).clone())
            .collect();
        Ok(FindPage {
            data,
            total: matching.len() as u64,
            skip,
            limit,
        })
    }

    async fn get(&self, id: &RecordId, _query: &Query) -> TransportResult<Record> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id_value() == Some(id.as_value()))
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    async fn create(&self, data: &Value, _query: &Query) -> TransportResult<Record> {
        let mut body = match data {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(TransportError::Rejected {
                    service: self.name.clone(),
                    status: 400,
                    message: "record must be an object".to_string(),
                })
            }
        };
        if !body.contains_key(ID_FIELD) {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            body.insert(ID_FIELD.to_string(), json!(format!("{}-{}", self.name, n)));
        }
        let record = Record::new(Value::Object(body));
        self.records.write().await.push(record.clone());
        self.emit(ServiceEvent::created(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &RecordId, data: &Value, _query: &Query) -> TransportResult<Record> {
        let mut body = data.as_object().cloned().unwrap_or_default();
        body.insert(ID_FIELD.to_string(), id.as_value().clone());
        let record = Record::new(Value::Object(body));
        {
            let mut records = self.records.write().await;
            let slot = records
                .iter_mut()
                .find(|r| r.id_value() == Some(id.as_value()))
                .ok_or_else(|| self.not_found(id))?;
            *slot = record.clone();
        }
        self.emit(ServiceEvent::updated(record.clone()));
        Ok(record)
    }

    async fn patch(&self, id: &RecordId, data: &Value, _query: &Query) -> TransportResult<Record> {
        let record = {
            let mut records = self.records.write().await;
            let slot = records
                .iter_mut()
                .find(|r| r.id_value() == Some(id.as_value()))
                .ok_or_else(|| self.not_found(id))?;
            let mut merged: Map<String, Value> =
                slot.as_value().as_object().cloned().unwrap_or_default();
            if let Some(changes) = data.as_object() {
                for (key, value) in changes {
                    merged.insert(key.clone(), value.clone());
                }
            }
            *slot = Record::new(Value::Object(merged));
            slot.clone()
        };
        self.emit(ServiceEvent::patched(record.clone()));
        Ok(record)
    }

    async fn remove(&self, id: &RecordId, _query: &Query) -> TransportResult<Record> {
        let record = {
            let mut records = self.records.write().await;
            let index = records
                .iter()
                .position(|r| r.id_value() == Some(id.as_value()))
                .ok_or_else(|| self.not_found(id))?;
            records.remove(index)
        };
        self.emit(ServiceEvent::removed(record.clone()));
        Ok(record)
    }

    fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Record with identifier `id` and the given extra fields.
pub fn record(id: &str, fields: Value) -> Record {
    let mut body = fields.as_object().cloned().unwrap_or_default();
    body.insert(ID_FIELD.to_string(), json!(id));
    Record::new(Value::Object(body))
}

/// Record with identifier `id` and a `type` field.
pub fn typed(id: &str, kind: &str) -> Record {
    record(id, json!({ "type": kind }))
}

/// Records `<prefix>0 .. <prefix>{count-1}`, all of type `a`.
pub fn numbered(prefix: &str, count: usize) -> Vec<Record> {
    (0..count)
        .map(|n| typed(&format!("{}{}", prefix, n), "a"))
        .collect()
}

/// Identifiers of `records`, rendered as strings.
pub fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.id().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}

/// Whether no two records share an identifier.
pub fn ids_unique(records: &[Record]) -> bool {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .all(|r| seen.insert(r.id_value().map(Value::to_string).unwrap_or_default()))
}

/// Collects snapshots handed to a listener.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identifiers of one published window.
    pub fn push(&self, items: &[Record]) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).push(ids(items));
    }

    pub fn frames(&self) -> Vec<Vec<String>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Vec<String>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for records and server events.

    use super::*;
    use proptest::prelude::*;

    /// Identifier drawn from a small pool so sequences revisit records.
    pub fn arb_record_id() -> impl Strategy<Value = String> {
        (0u8..12).prop_map(|n| format!("r{}", n))
    }

    /// Channel value drawn from `a`, `b`, `c`.
    pub fn arb_kind() -> impl Strategy<Value = String> {
        prop_oneof![Just("a".to_string()), Just("b".to_string()), Just("c".to_string())]
    }

    pub fn arb_record() -> impl Strategy<Value = Record> {
        (arb_record_id(), arb_kind(), any::<u16>()).prop_map(|(id, kind, rev)| {
            record(&id, json!({ "type": kind, "rev": rev }))
        })
    }

    pub fn arb_event_kind() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::Created),
            Just(EventKind::Updated),
            Just(EventKind::Patched),
            Just(EventKind::Removed),
        ]
    }

    pub fn arb_event() -> impl Strategy<Value = ServiceEvent> {
        (arb_event_kind(), arb_record()).prop_map(|(kind, record)| ServiceEvent::new(kind, record))
    }

    /// Created/updated/patched events only, the ones that can insert.
    pub fn arb_inserting_event() -> impl Strategy<Value = ServiceEvent> {
        (
            prop_oneof![
                Just(EventKind::Created),
                Just(EventKind::Updated),
                Just(EventKind::Patched),
            ],
            arb_record(),
        )
            .prop_map(|(kind, record)| ServiceEvent::new(kind, record))
    }

    pub fn arb_events(max: usize) -> impl Strategy<Value = Vec<ServiceEvent>> {
        prop::collection::vec(arb_event(), 0..max)
    }

    pub fn arb_insertion_policy() -> impl Strategy<Value = InsertionPolicy> {
        prop_oneof![Just(InsertionPolicy::Append), Just(InsertionPolicy::Prepend)]
    }
}
