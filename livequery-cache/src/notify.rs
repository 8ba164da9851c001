//! Change notification emitter.
//!
//! Each cache owns one `ChangeNotifier`. Listeners are invoked synchronously
//! from `publish`, after the cache has released its state lock, so a
//! listener may freely read the cache it is subscribed to.

use crate::state::PageView;
use livequery_core::{CacheError, Record};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Local notifications a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    /// The local window changed (or was published for the first time).
    DataChange,
    /// A `find`-based load completed and overwrote or extended the window.
    Loaded,
}

/// Listener receiving the current window and cursor.
pub type DataListener = Arc<dyn Fn(&[Record], &PageView) + Send + Sync>;

/// Listener receiving hard failures raised while applying server events.
pub type ErrorListener = Arc<dyn Fn(&CacheError) + Send + Sync>;

/// Handle returned by `on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    data: RwLock<Vec<(ListenerId, CacheEvent, DataListener)>>,
    errors: RwLock<Vec<(ListenerId, ErrorListener)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on<F>(&self, event: CacheEvent, listener: F) -> ListenerId
    where
        F: Fn(&[Record], &PageView) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, event, Arc::new(listener)));
        id
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheError) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.errors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _, _)| {
                let keep = *existing != id;
                removed |= !keep;
                keep
            });
        self.errors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| {
                let keep = *existing != id;
                removed |= !keep;
                keep
            });
        removed
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.errors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn listener_count(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
            + self.errors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Invoke every listener registered for `event`, in registration order.
    pub fn publish(&self, event: CacheEvent, items: &[Record], view: &PageView) {
        let listeners: Vec<DataListener> = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, registered, _)| *registered == event)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(items, view);
        }
    }

    pub fn publish_error(&self, error: &CacheError) {
        let listeners: Vec<ErrorListener> = self
            .errors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn view(len: usize) -> PageView {
        PageView {
            total: len as u64,
            skip: 0,
            page: 1,
            limit: 10,
            len,
        }
    }

    #[test]
    fn test_publish_reaches_matching_listeners() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        notifier.on(CacheEvent::DataChange, move |items, view| {
            sink.lock().expect("sink lock").push((items.len(), view.total));
        });
        notifier.on(CacheEvent::Loaded, |_, _| panic!("wrong event"));

        let items = vec![Record::new(json!({ "_id": 1 }))];
        notifier.publish(CacheEvent::DataChange, &items, &view(1));

        assert_eq!(*seen.lock().expect("seen lock"), vec![(1, 1)]);
    }

    #[test]
    fn test_off_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let id = notifier.on(CacheEvent::DataChange, |_, _| panic!("should be removed"));
        assert!(notifier.off(id));
        assert!(!notifier.off(id));
        notifier.publish(CacheEvent::DataChange, &[], &view(0));
    }

    #[test]
    fn test_clear_drops_everything() {
        let notifier = ChangeNotifier::new();
        notifier.on(CacheEvent::DataChange, |_, _| {});
        notifier.on_error(|_| {});
        assert_eq!(notifier.listener_count(), 2);
        notifier.clear();
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_publish_error() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        notifier.on_error(move |err| {
            assert!(matches!(err, CacheError::LockPoisoned));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        notifier.publish_error(&CacheError::LockPoisoned);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_subscribe_while_publishing() {
        let notifier = Arc::new(ChangeNotifier::new());
        let inner = Arc::clone(&notifier);
        notifier.on(CacheEvent::DataChange, move |_, _| {
            inner.on(CacheEvent::Loaded, |_, _| {});
        });
        notifier.publish(CacheEvent::DataChange, &[], &view(0));
        assert_eq!(notifier.listener_count(), 2);
    }
}
