//! livequery cache engine
//!
//! Keeps a paginated local mirror of one remote query consistent with the
//! server's created/updated/patched/removed events.
//!
//! - [`state`]: the synchronous reconciliation rules
//! - [`notify`]: the per-cache change notifier
//! - [`live`]: the async handle tying a remote service to both

pub mod live;
pub mod notify;
pub mod state;

pub use live::LiveQueryCache;
pub use notify::{CacheEvent, ChangeNotifier, DataListener, ErrorListener, ListenerId};
pub use state::{CacheState, PageView, Reconciliation};

pub use livequery_core::{
    CacheError, CacheResult, CacheSettings, Channel, ChannelSet, EventKind, FindPage,
    InsertionPolicy, Query, Record, RecordId, RemoteService, ServiceEvent,
};
