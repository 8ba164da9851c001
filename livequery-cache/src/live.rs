//! Live query cache handle.
//!
//! A `LiveQueryCache` binds one remote collection and one query. It seeds its
//! window with an initial `find`, applies server events as they arrive, and
//! pages through further results on request. Handles are cheap to clone and
//! all clones share the same cache.
//!
//! # Example
//!
//! ```ignore
//! let cache = LiveQueryCache::connect(service, query, CacheSettings::default()).await;
//! cache.on(CacheEvent::DataChange, |items, view| {
//!     render(items, view.total);
//! });
//! cache.load_more().await?;
//! ```

use crate::notify::{CacheEvent, ChangeNotifier, ListenerId};
use crate::state::{CacheState, PageView};
use livequery_core::{
    CacheError, CacheResult, CacheSettings, EventKind, EventReceiver, FindPage, Query, Record,
    RecordId, RemoteService, ServiceEvent, TransportResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Mutable binding of a cache: its window plus what it is bound to.
struct Binding {
    state: CacheState,
    query: Query,
    settings: CacheSettings,
}

struct Shared<S: RemoteService + ?Sized> {
    service: Arc<S>,
    binding: Mutex<Binding>,
    notifier: ChangeNotifier,
    /// Serializes find-then-assign sequences so completions cannot interleave.
    loads: tokio::sync::Mutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

pub struct LiveQueryCache<S: RemoteService + ?Sized + 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: RemoteService + ?Sized + 'static> Clone for LiveQueryCache<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: RemoteService + ?Sized + 'static> LiveQueryCache<S> {
    fn unstarted(service: Arc<S>, query: Query, settings: CacheSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                binding: Mutex::new(Binding {
                    state: CacheState::new(),
                    query,
                    settings,
                }),
                notifier: ChangeNotifier::new(),
                loads: tokio::sync::Mutex::new(()),
                pump: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Bind a cache to `service` without loading anything yet.
    ///
    /// Must be called from within a tokio runtime. Server events are applied
    /// from this point on. Register listeners, then call [`init`](Self::init)
    /// to publish the empty window and issue the initial `find`.
    pub fn bind(service: Arc<S>, query: Query, settings: CacheSettings) -> Self {
        let cache = Self::unstarted(service, query, settings);
        cache.start_pump();
        cache
    }

    /// Bind a cache and wait for the initial load to settle.
    ///
    /// Initial load failures are logged, never returned: the cache is handed
    /// back empty and keeps applying events. Use [`bind`](Self::bind) when
    /// listeners must see the empty window that precedes the load.
    pub async fn connect(service: Arc<S>, query: Query, settings: CacheSettings) -> Self {
        let cache = Self::bind(service, query, settings);
        cache.initial_load().await;
        cache
    }

    fn start_pump(&self) {
        let events = self.shared.service.subscribe();
        let handle = spawn_pump(Arc::downgrade(&self.shared), events);
        let mut pump = self.shared.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pump.replace(handle) {
            previous.abort();
        }
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Binding>> {
        self.shared
            .binding
            .lock()
            .map_err(|_| CacheError::LockPoisoned)
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.shared.destroyed.load(Ordering::Acquire) {
            return Err(CacheError::Destroyed {
                service: self.service_name().to_string(),
            });
        }
        Ok(())
    }

    pub fn service(&self) -> &Arc<S> {
        &self.shared.service
    }

    pub fn service_name(&self) -> &str {
        self.shared.service.name()
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    /// Subscribe to a local notification.
    pub fn on<F>(&self, event: CacheEvent, listener: F) -> ListenerId
    where
        F: Fn(&[Record], &PageView) + Send + Sync + 'static,
    {
        self.shared.notifier.on(event, listener)
    }

    /// Subscribe to failures raised while applying server events.
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheError) + Send + Sync + 'static,
    {
        self.shared.notifier.on_error(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.notifier.off(id)
    }

    /// Snapshot of the local window.
    pub fn items(&self) -> CacheResult<Vec<Record>> {
        Ok(self.lock()?.state.items().to_vec())
    }

    pub fn view(&self) -> CacheResult<PageView> {
        Ok(self.lock()?.state.view())
    }

    pub fn query(&self) -> CacheResult<Query> {
        Ok(self.lock()?.query.clone())
    }

    /// Position of the record sharing `record`'s identifier.
    pub fn find_index(&self, record: &Record) -> CacheResult<Option<usize>> {
        Ok(self.lock()?.state.find_index(record))
    }

    /// Membership test against the current channels.
    pub fn in_channel(&self, record: &Record) -> CacheResult<bool> {
        Ok(self.lock()?.settings.channels.admits(record)?)
    }

    fn snapshot(&self) -> CacheResult<(Vec<Record>, PageView)> {
        let binding = self.lock()?;
        Ok((binding.state.items().to_vec(), binding.state.view()))
    }

    fn publish_snapshot(&self, event: CacheEvent) {
        match self.snapshot() {
            Ok((items, view)) => self.shared.notifier.publish(event, &items, &view),
            Err(err) => tracing::error!(service = %self.service_name(), error = %err, "Cannot publish cache snapshot"),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Publish the current (empty) window, then load in the background.
    pub fn init(&self) {
        self.publish_snapshot(CacheEvent::DataChange);
        let cache = self.clone();
        tokio::spawn(async move {
            cache.initial_load().await;
        });
    }

    /// Issue the bound query and seed the window from the response.
    ///
    /// Failures leave the state untouched and are only logged. A destroyed
    /// cache is never written to.
    pub async fn initial_load(&self) {
        let _gate = self.shared.loads.lock().await;
        if self.is_destroyed() {
            tracing::debug!(service = %self.service_name(), "Initial load skipped; cache destroyed");
            return;
        }
        let (query, debug) = match self.lock() {
            Ok(binding) => (binding.query.clone(), binding.settings.debug),
            Err(err) => {
                tracing::error!(service = %self.service_name(), error = %err, "Initial load skipped");
                return;
            }
        };

        match self.shared.service.find(&query).await {
            Ok(_) if self.is_destroyed() => {
                tracing::debug!(service = %self.service_name(), "Initial load discarded; cache destroyed");
            }
            Ok(page) => {
                let applied = self.lock().map(|mut guard| {
                    let binding = &mut *guard;
                    binding.state.replace_page(page, None, &binding.settings);
                    binding.state.view()
                });
                match applied {
                    Ok(view) => {
                        if debug {
                            tracing::debug!(service = %self.service_name(), total = view.total, len = view.len, limit = view.limit, "Initial load complete");
                        }
                        self.publish_snapshot(CacheEvent::DataChange);
                        self.publish_snapshot(CacheEvent::Loaded);
                    }
                    Err(err) => {
                        tracing::error!(service = %self.service_name(), error = %err, "Initial load discarded")
                    }
                }
            }
            Err(err) => {
                tracing::warn!(service = %self.service_name(), error = %err, "Initial load failed; keeping current state");
            }
        }
    }

    /// Clear the window and cursor, optionally rebind, and load again.
    pub async fn reset(&self, query: Option<Query>, settings: Option<CacheSettings>) -> CacheResult<()> {
        self.ensure_live()?;
        {
            let mut binding = self.lock()?;
            binding.state.clear();
            if let Some(query) = query {
                binding.query = query;
            }
            if let Some(settings) = settings {
                binding.settings = settings;
            }
        }
        tracing::info!(service = %self.service_name(), "Cache reset");
        self.publish_snapshot(CacheEvent::DataChange);
        self.initial_load().await;
        Ok(())
    }

    /// Release the event subscription and every listener.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pump) = self
            .shared
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
        self.shared.notifier.clear();
        tracing::info!(service = %self.service_name(), "Cache destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    // ========================================================================
    // SERVER EVENTS
    // ========================================================================

    /// Apply one server event to the local window.
    ///
    /// Events are normally fed by the subscription pump; calling this directly
    /// is equivalent to the server emitting `event`.
    pub fn handle_event(&self, event: ServiceEvent) -> CacheResult<()> {
        self.ensure_live()?;
        let ServiceEvent { kind, record } = event;

        let (outcome, trace) = {
            let mut guard = self.lock()?;
            let binding = &mut *guard;
            let trace = binding.settings.debug.then(|| {
                let in_channel = binding.settings.channels.admits(&record).ok();
                (record.id(), record.as_value().to_string(), in_channel)
            });
            let outcome = match kind {
                EventKind::Created => binding.state.apply_created(record, &binding.settings)?,
                EventKind::Removed => binding.state.apply_removed(&record),
                EventKind::Updated | EventKind::Patched => {
                    binding.state.apply_changed(record, &binding.settings)?
                }
            };
            (outcome, trace)
        };

        if let Some((record_id, payload, in_channel)) = trace {
            tracing::debug!(
                service = %self.service_name(),
                event = %kind,
                id = ?record_id,
                in_channel = ?in_channel,
                outcome = ?outcome,
                payload = %payload,
                "Server event applied"
            );
        }

        if !outcome.is_mutation() {
            return Ok(());
        }
        self.publish_snapshot(CacheEvent::DataChange);
        if outcome.needs_refill() {
            self.spawn_refill();
        }
        Ok(())
    }

    /// Reload the first page in the background.
    fn spawn_refill(&self) {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.load_page(1).await {
                tracing::warn!(service = %cache.service_name(), error = %err, "Refill after removal failed");
            }
        });
    }

    // ========================================================================
    // PAGINATION
    // ========================================================================

    /// Replace the window with page `page` (1-based; zero is treated as one).
    pub async fn load_page(&self, page: u64) -> CacheResult<()> {
        self.ensure_live()?;
        let _gate = self.shared.loads.lock().await;
        let page = page.max(1);
        let (query, debug) = {
            let binding = self.lock()?;
            let skip = binding.state.skip_for_page(page);
            (binding.query.with_skip(skip), binding.settings.debug)
        };

        let response = self.shared.service.find(&query).await?;
        self.ensure_live()?;
        let view = {
            let mut guard = self.lock()?;
            let binding = &mut *guard;
            binding.state.replace_page(response, Some(page), &binding.settings);
            binding.state.view()
        };
        if debug {
            tracing::debug!(service = %self.service_name(), page, total = view.total, len = view.len, "Page loaded");
        }
        self.publish_snapshot(CacheEvent::DataChange);
        self.publish_snapshot(CacheEvent::Loaded);
        Ok(())
    }

    /// Merge the next page into the window.
    ///
    /// Returns `false` without contacting the server when the cursor is
    /// already past the last page.
    pub async fn load_more(&self) -> CacheResult<bool> {
        self.ensure_live()?;
        let _gate = self.shared.loads.lock().await;
        let (query, skip, debug) = {
            let binding = self.lock()?;
            if binding.state.page() > binding.state.total_pages() {
                return Ok(false);
            }
            let skip = binding.state.next_skip();
            (binding.query.with_skip(skip), skip, binding.settings.debug)
        };

        let response = self.shared.service.find(&query).await?;
        self.ensure_live()?;
        let view = {
            let mut guard = self.lock()?;
            let binding = &mut *guard;
            binding.state.merge_page(response, skip, &binding.settings);
            binding.state.view()
        };
        if debug {
            tracing::debug!(service = %self.service_name(), page = view.page, total = view.total, len = view.len, "More loaded");
        }
        self.publish_snapshot(CacheEvent::DataChange);
        self.publish_snapshot(CacheEvent::Loaded);
        Ok(true)
    }

    /// Keep merging pages until the cursor reaches the last page.
    ///
    /// The page count is re-derived from the latest total before every step,
    /// and the number of steps is bounded by `max_load_all_iterations`.
    pub async fn load_all(&self) -> CacheResult<()> {
        let max = self.lock()?.settings.max_load_all_iterations;
        let mut iterations = 0usize;
        loop {
            let (page, pages) = {
                let binding = self.lock()?;
                (binding.state.page(), binding.state.total_pages())
            };
            if page >= pages {
                return Ok(());
            }
            if iterations >= max {
                tracing::warn!(service = %self.service_name(), page, pages, limit = max, "load_all did not converge");
                return Err(CacheError::IterationLimitExceeded {
                    limit: max,
                    page,
                    pages,
                });
            }
            iterations += 1;
            if !self.load_more().await? {
                return Ok(());
            }
        }
    }

    // ========================================================================
    // PASS-THROUGH
    // ========================================================================

    pub async fn find(&self, query: &Query) -> TransportResult<FindPage> {
        self.shared.service.find(query).await
    }

    pub async fn get(&self, id: &RecordId, query: &Query) -> TransportResult<Record> {
        self.shared.service.get(id, query).await
    }

    pub async fn create(&self, data: &Value, query: &Query) -> TransportResult<Record> {
        self.shared.service.create(data, query).await
    }

    pub async fn update(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record> {
        self.shared.service.update(id, data, query).await
    }

    pub async fn patch(&self, id: &RecordId, data: &Value, query: &Query) -> TransportResult<Record> {
        self.shared.service.patch(id, data, query).await
    }

    pub async fn remove(&self, id: &RecordId, query: &Query) -> TransportResult<Record> {
        self.shared.service.remove(id, query).await
    }
}

/// Drain the service's event stream into the cache until it closes or the
/// cache is dropped.
fn spawn_pump<S>(shared: Weak<Shared<S>>, mut events: EventReceiver) -> JoinHandle<()>
where
    S: RemoteService + ?Sized + 'static,
{
    tokio::spawn(async move {
        loop {
            let received = events.recv().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let cache = LiveQueryCache { shared };
            match received {
                Ok(event) => {
                    if let Err(err) = cache.handle_event(event) {
                        if matches!(err, CacheError::Destroyed { .. }) {
                            break;
                        }
                        tracing::error!(service = %cache.service_name(), error = %err, "Failed to apply server event");
                        cache.shared.notifier.publish_error(&err);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(service = %cache.service_name(), skipped, "Event stream lagged; reloading first page");
                    cache.spawn_refill();
                }
                Err(RecvError::Closed) => {
                    tracing::info!(service = %cache.service_name(), "Event stream closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use livequery_core::{Channel, InsertionPolicy, TransportError};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast;

    /// Minimal service answering every find with a fixed page.
    struct FixedService {
        page: FindPage,
        fail: bool,
        finds: AtomicUsize,
        stall: Option<Arc<tokio::sync::Notify>>,
        events: broadcast::Sender<ServiceEvent>,
    }

    impl FixedService {
        fn build(page: FindPage, fail: bool, stall: Option<Arc<tokio::sync::Notify>>) -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                page,
                fail,
                finds: AtomicUsize::new(0),
                stall,
                events,
            })
        }

        fn new(page: FindPage) -> Arc<Self> {
            Self::build(page, false, None)
        }

        fn failing() -> Arc<Self> {
            Self::build(FindPage::default(), true, None)
        }

        /// Every find waits for a permit on `release` before answering.
        fn stalled(page: FindPage, release: Arc<tokio::sync::Notify>) -> Arc<Self> {
            Self::build(page, false, Some(release))
        }
    }

    #[async_trait]
    impl RemoteService for FixedService {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn find(&self, _query: &Query) -> TransportResult<FindPage> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.stall {
                release.notified().await;
            }
            if self.fail {
                return Err(TransportError::ConnectionClosed {
                    reason: "offline".to_string(),
                });
            }
            Ok(self.page.clone())
        }

        async fn get(&self, id: &RecordId, _query: &Query) -> TransportResult<Record> {
            Err(TransportError::NotFound {
                service: "fixed".to_string(),
                id: id.to_string(),
            })
        }

        async fn create(&self, data: &Value, _query: &Query) -> TransportResult<Record> {
            Ok(Record::new(data.clone()))
        }

        async fn update(&self, _id: &RecordId, data: &Value, _query: &Query) -> TransportResult<Record> {
            Ok(Record::new(data.clone()))
        }

        async fn patch(&self, _id: &RecordId, data: &Value, _query: &Query) -> TransportResult<Record> {
            Ok(Record::new(data.clone()))
        }

        async fn remove(&self, id: &RecordId, _query: &Query) -> TransportResult<Record> {
            Ok(Record::new(json!({ "_id": id.as_value() })))
        }

        fn subscribe(&self) -> EventReceiver {
            self.events.subscribe()
        }
    }

    fn rec(id: &str) -> Record {
        Record::new(json!({ "_id": id, "type": "a" }))
    }

    fn page_of(ids: &[&str], total: u64, limit: u64) -> FindPage {
        FindPage {
            data: ids.iter().map(|id| rec(id)).collect(),
            total,
            skip: 0,
            limit,
        }
    }

    #[tokio::test]
    async fn test_connect_seeds_state() {
        let service = FixedService::new(page_of(&["A", "B"], 7, 2));
        let cache = LiveQueryCache::connect(service, Query::new(), CacheSettings::default()).await;
        let view = cache.view().expect("view");
        assert_eq!(view.total, 7);
        assert_eq!(view.limit, 2);
        assert_eq!(view.page, 1);
        assert_eq!(cache.items().expect("items").len(), 2);
    }

    #[tokio::test]
    async fn test_initial_load_failure_is_swallowed() {
        let service = FixedService::failing();
        let cache =
            LiveQueryCache::connect(Arc::clone(&service), Query::new(), CacheSettings::default())
                .await;
        assert!(cache.items().expect("items").is_empty());
        assert_eq!(cache.view().expect("view").limit, livequery_core::DEFAULT_LIMIT);
        assert_eq!(service.finds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_event_respects_policy() {
        let service = FixedService::new(page_of(&["A", "B", "C"], 3, 3));
        let settings = CacheSettings::new()
            .with_insertion_policy(InsertionPolicy::Prepend)
            .with_pagination_enforced(true);
        let cache = LiveQueryCache::connect(service, Query::new(), settings).await;
        cache
            .handle_event(ServiceEvent::created(rec("D")))
            .expect("event should apply");
        let ids: Vec<_> = cache
            .items()
            .expect("items")
            .iter()
            .filter_map(Record::id)
            .collect();
        assert_eq!(
            ids,
            vec![RecordId::from("D"), RecordId::from("A"), RecordId::from("B")]
        );
    }

    #[tokio::test]
    async fn test_field_path_error_surfaces() {
        let service = FixedService::new(page_of(&[], 0, 10));
        let settings = CacheSettings::new().with_channel(Channel::equals("meta.kind", "x"));
        let cache = LiveQueryCache::connect(service, Query::new(), settings).await;
        let err = cache
            .handle_event(ServiceEvent::created(rec("A")))
            .expect_err("missing intermediate should fail");
        assert!(matches!(err, CacheError::FieldPath(_)));
        assert!(cache.in_channel(&rec("A")).is_err());
    }

    #[tokio::test]
    async fn test_destroy_rejects_further_work() {
        let service = FixedService::new(page_of(&["A"], 1, 10));
        let cache = LiveQueryCache::connect(service, Query::new(), CacheSettings::default()).await;
        cache.on(CacheEvent::DataChange, |_, _| {});
        cache.destroy();
        assert!(cache.is_destroyed());
        assert!(matches!(cache.load_more().await, Err(CacheError::Destroyed { .. })));
        assert!(matches!(
            cache.handle_event(ServiceEvent::created(rec("B"))),
            Err(CacheError::Destroyed { .. })
        ));
        assert_eq!(cache.shared.notifier.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_waits_for_init() {
        let service = FixedService::new(page_of(&["A"], 1, 10));
        let cache = LiveQueryCache::bind(Arc::clone(&service), Query::new(), CacheSettings::default());
        tokio::task::yield_now().await;
        assert_eq!(service.finds.load(Ordering::SeqCst), 0);

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        cache.on(CacheEvent::DataChange, move |items, _| {
            sink.lock().expect("frames lock").push(items.len());
        });
        cache.init();
        // the empty frame is published before init returns
        assert_eq!(*frames.lock().expect("frames lock"), vec![0]);

        for _ in 0..100 {
            if frames.lock().expect("frames lock").len() >= 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*frames.lock().expect("frames lock"), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_initial_load_skipped_after_destroy() {
        let service = FixedService::new(page_of(&["A"], 1, 10));
        let cache = LiveQueryCache::bind(Arc::clone(&service), Query::new(), CacheSettings::default());
        cache.init();
        cache.destroy();
        cache.initial_load().await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.finds.load(Ordering::SeqCst), 0);
        assert!(cache.items().expect("items").is_empty());
    }

    #[tokio::test]
    async fn test_destroy_during_initial_load_discards_page() {
        let release = Arc::new(tokio::sync::Notify::new());
        let service = FixedService::stalled(page_of(&["A", "B"], 2, 10), Arc::clone(&release));
        let cache = LiveQueryCache::bind(Arc::clone(&service), Query::new(), CacheSettings::default());
        let loaded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loaded);
        cache.on(CacheEvent::Loaded, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cache.init();
        while service.finds.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        cache.destroy();
        release.notify_one();
        let _gate = cache.shared.loads.lock().await;
        assert!(cache.items().expect("items").is_empty());
        assert_eq!(cache.view().expect("view").total, 0);
        assert_eq!(loaded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_more_past_last_page_is_noop() {
        let service = FixedService::new(page_of(&["A"], 1, 10));
        let cache =
            LiveQueryCache::connect(Arc::clone(&service), Query::new(), CacheSettings::default())
                .await;
        // page 1 of 1: one request past the end is allowed, then nothing more
        assert!(cache.load_more().await.expect("load_more"));
        assert!(!cache.load_more().await.expect("load_more"));
        assert_eq!(service.finds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_passthrough_create() {
        let service = FixedService::new(FindPage::default());
        let cache = LiveQueryCache::connect(service, Query::new(), CacheSettings::default()).await;
        let created = cache
            .create(&json!({ "_id": "n1", "text": "hi" }), &Query::new())
            .await
            .expect("create should succeed");
        assert_eq!(created.id(), Some("n1".into()));
        // pass-through does not touch the window
        assert!(cache.items().expect("items").is_empty());
    }
}
