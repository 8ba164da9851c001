//! livequery client transport
//!
//! Binds live query caches to a server exposing collections over REST and
//! broadcasting their mutations over a WebSocket.
//!
//! - [`config`]: TOML client configuration
//! - [`rest`]: HTTP calls per collection
//! - [`realtime`]: event feed, frame decoding and per-service fan-out
//! - [`collection`]: `RemoteService` implementation over both
//! - [`connection`]: the hub that opens services and caches
//! - [`telemetry`]: tracing subscriber setup

pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod realtime;
pub mod rest;
pub mod telemetry;

pub use collection::RemoteCollection;
pub use config::{AuthConfig, ClientConfig, ConfigError, ReconnectConfig, CONFIG_ENV};
pub use connection::Connection;
pub use error::{ClientError, ClientResult};
pub use realtime::{decode_frame, EventRouter, Frame};
pub use rest::{query_pairs, RestTransport};
pub use telemetry::{init_tracing, LogFormat};

pub use livequery_cache::{CacheEvent, LiveQueryCache, PageView};
pub use livequery_core::{CacheSettings, Channel, InsertionPolicy, Query, Record, RecordId};
