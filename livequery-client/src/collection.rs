//! `RemoteService` over REST calls and the shared realtime feed.

use crate::realtime::{normalize_service, EventRouter};
use crate::rest::RestTransport;
use async_trait::async_trait;
use livequery_core::{
    EventReceiver, FindPage, Query, Record, RecordId, RemoteService, TransportResult,
};
use serde_json::Value;
use std::sync::Arc;

/// One named collection on the server.
#[derive(Clone)]
pub struct RemoteCollection {
    name: String,
    rest: RestTransport,
    router: Arc<EventRouter>,
}

impl RemoteCollection {
    pub fn new(name: &str, rest: RestTransport, router: Arc<EventRouter>) -> Self {
        Self {
            name: normalize_service(name),
            rest,
            router,
        }
    }
}

#[async_trait]
impl RemoteService for RemoteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &Query) -> TransportResult<FindPage> {
        self.rest
            .find(&self.name, query)
            .await
            .map_err(|e| e.into_transport(&self.name, None))
    }

    async fn get(&self, id: &RecordId, query: &Query) -> TransportResult<Record> {
        self.rest
            .get(&self.name, id, query)
            .await
            .map_err(|e| e.into_transport(&self.name, Some(&id.to_path_segment())))
    }

    async fn create(&self, data: &Value, query: &Query) -> TransportResult<Record> {
        self.rest
            .create(&self.name, data, query)
            .await
            .map_err(|e| e.into_transport(&self.name, None))
    }

    async fn update(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record> {
        self.rest
            .update(&self.name, id, data, query)
            .await
            .map_err(|e| e.into_transport(&self.name, Some(&id.to_path_segment())))
    }

    async fn patch(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record> {
        self.rest
            .patch(&self.name, id, data, query)
            .await
            .map_err(|e| e.into_transport(&self.name, Some(&id.to_path_segment())))
    }

    async fn remove(&self, id: &RecordId, query: &Query) -> TransportResult<Record> {
        self.rest
            .remove(&self.name, id, query)
            .await
            .map_err(|e| e.into_transport(&self.name, Some(&id.to_path_segment())))
    }

    fn subscribe(&self) -> EventReceiver {
        self.router.subscribe(&self.name)
    }
}
