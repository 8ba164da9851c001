//! Per-cache configuration.

use crate::channel::{Channel, ChannelSet};
use serde::{Deserialize, Serialize};

/// Page size assumed until the server reports one.
pub const DEFAULT_LIMIT: u64 = 10;

/// Default bound on `load_all` steps.
pub const DEFAULT_MAX_LOAD_ALL_ITERATIONS: usize = 1_000;

/// Where newly arriving in-scope records are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertionPolicy {
    /// Insert at the end; evictions happen at the start.
    #[default]
    #[serde(alias = "end")]
    Append,
    /// Insert at the start; evictions happen at the end.
    #[serde(alias = "start")]
    Prepend,
}

/// Configuration for a live query cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Membership channels; empty admits every record.
    pub channels: ChannelSet,
    /// Emit payload-level traces for every reconciliation step.
    pub debug: bool,
    /// Placement of newly arriving records.
    pub insertion_policy: InsertionPolicy,
    /// Cap the local window at the server page size.
    pub pagination_enforced: bool,
    /// Upper bound on `load_all` steps before giving up.
    pub max_load_all_iterations: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            channels: ChannelSet::default(),
            debug: false,
            insertion_policy: InsertionPolicy::default(),
            pagination_enforced: false,
            max_load_all_iterations: DEFAULT_MAX_LOAD_ALL_ITERATIONS,
        }
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the channel set.
    pub fn with_channels(mut self, channels: impl Into<ChannelSet>) -> Self {
        self.channels = channels.into();
        self
    }

    /// Add one channel.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_insertion_policy(mut self, policy: InsertionPolicy) -> Self {
        self.insertion_policy = policy;
        self
    }

    pub fn with_pagination_enforced(mut self, enforced: bool) -> Self {
        self.pagination_enforced = enforced;
        self
    }

    /// Set the `load_all` bound. Zero is raised to one.
    pub fn with_max_load_all_iterations(mut self, max: usize) -> Self {
        self.max_load_all_iterations = max.max(1);
        self
    }
}
