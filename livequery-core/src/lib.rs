//! livequery core types
//!
//! Records, query parameters, membership channels, cache settings and the
//! remote service contract. The consistency engine lives in
//! `livequery-cache`; this crate holds no behavior beyond the membership test.

pub mod channel;
pub mod error;
pub mod query;
pub mod record;
pub mod service;
pub mod settings;

pub use channel::{resolve_path, Channel, ChannelFn, ChannelSet, ChannelSpec, ChannelTest};
pub use error::{CacheError, CacheResult, FieldPathError, TransportError, TransportResult};
pub use query::{FindPage, Query, FILTER_KEY, LIMIT_KEY, SKIP_KEY};
pub use record::{Record, RecordId, ID_FIELD};
pub use service::{EventKind, EventReceiver, RemoteService, ServiceEvent};
pub use settings::{
    CacheSettings, InsertionPolicy, DEFAULT_LIMIT, DEFAULT_MAX_LOAD_ALL_ITERATIONS,
};
