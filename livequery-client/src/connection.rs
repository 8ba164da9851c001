//! Connection hub: one REST transport and one realtime feed shared by every
//! service and cache opened through it.

use crate::collection::RemoteCollection;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::realtime::{spawn_feed, EventRouter, WsClient};
use crate::rest::RestTransport;
use livequery_cache::LiveQueryCache;
use livequery_core::{CacheSettings, Query};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Connection {
    rest: RestTransport,
    router: Arc<EventRouter>,
    shutdown: watch::Sender<bool>,
    feed: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Validate `config` and start the realtime feed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let rest = RestTransport::new(config)?;
        let ws = WsClient::new(config)?;
        let router = Arc::new(EventRouter::new(config.event_buffer));
        let (shutdown, signal) = watch::channel(false);
        let feed = spawn_feed(ws, Arc::clone(&router), signal);
        tracing::info!(base_url = %config.base_url, ws_endpoint = %config.ws_endpoint, "Connection opened");
        Ok(Self {
            rest,
            router,
            shutdown,
            feed: Mutex::new(Some(feed)),
        })
    }

    /// Handle on the collection named `name`.
    pub fn service(&self, name: &str) -> Arc<RemoteCollection> {
        Arc::new(RemoteCollection::new(
            name,
            self.rest.clone(),
            Arc::clone(&self.router),
        ))
    }

    /// Bind a live cache to `query` on collection `name` and wait for its first load.
    pub async fn live(
        &self,
        name: &str,
        query: Query,
        settings: CacheSettings,
    ) -> LiveQueryCache<RemoteCollection> {
        LiveQueryCache::connect(self.service(name), query, settings).await
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn rest(&self) -> &RestTransport {
        &self.rest
    }

    /// Stop the realtime feed and wait for it to wind down.
    ///
    /// Caches keep working against REST but receive no further events.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let feed = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(feed) = feed {
            if let Err(err) = feed.await {
                tracing::warn!(error = %err, "Realtime feed ended abnormally");
            }
        }
        tracing::info!("Connection shut down");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
