//! Membership channels.
//!
//! A channel decides whether a record belongs in a cache's local window.
//! Channels form a broadening filter: a record is in scope when the channel
//! set is empty or when any one channel matches.

use crate::error::FieldPathError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Predicate over an extracted field value and the whole record.
///
/// The field value is `None` when the leaf of the path is absent.
pub type ChannelFn = Arc<dyn Fn(Option<&Value>, &Record) -> bool + Send + Sync>;

/// How a channel tests the value found at its path.
#[derive(Clone)]
pub enum ChannelTest {
    /// Strict equality with a literal.
    Equals(Value),
    /// Arbitrary test function.
    Matches(ChannelFn),
}

impl fmt::Debug for ChannelTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelTest::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            ChannelTest::Matches(_) => f.write_str("Matches(<fn>)"),
        }
    }
}

/// A single membership predicate on a dot-separated field path.
#[derive(Debug, Clone)]
pub struct Channel {
    path: String,
    segments: Vec<String>,
    test: ChannelTest,
}

impl Channel {
    pub fn new(path: impl Into<String>, test: ChannelTest) -> Self {
        let path = path.into();
        let segments = path.split('.').map(str::to_string).collect();
        Self {
            path,
            segments,
            test,
        }
    }

    /// Channel matching records whose field at `path` equals `value`.
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, ChannelTest::Equals(value.into()))
    }

    /// Channel delegating to a test function.
    pub fn matches<F>(path: impl Into<String>, test: F) -> Self
    where
        F: Fn(Option<&Value>, &Record) -> bool + Send + Sync + 'static,
    {
        Self::new(path, ChannelTest::Matches(Arc::new(test)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn test(&self) -> &ChannelTest {
        &self.test
    }

    /// Evaluate this channel against a record.
    pub fn admits(&self, record: &Record) -> Result<bool, FieldPathError> {
        let found = resolve_segments(record.as_value(), &self.path, &self.segments)?;
        Ok(match &self.test {
            ChannelTest::Equals(expected) => found == Some(expected),
            ChannelTest::Matches(test) => test(found, record),
        })
    }
}

/// Serializable literal channel, for channels declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub prop: String,
    pub value: Value,
}

impl From<ChannelSpec> for Channel {
    fn from(spec: ChannelSpec) -> Self {
        Channel::equals(spec.prop, spec.value)
    }
}

/// Ordered set of channels, OR-combined.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    channels: Vec<Channel>,
}

impl ChannelSet {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn push(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Whether `record` is in scope.
    ///
    /// Channels are evaluated in order and evaluation stops at the first
    /// match, so a broken path on a later channel is only reported when no
    /// earlier channel admitted the record.
    pub fn admits(&self, record: &Record) -> Result<bool, FieldPathError> {
        if self.channels.is_empty() {
            return Ok(true);
        }
        for channel in &self.channels {
            if channel.admits(record)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl From<Vec<Channel>> for ChannelSet {
    fn from(channels: Vec<Channel>) -> Self {
        Self::new(channels)
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Walk a dot path from `root`.
///
/// Returns `Ok(None)` when the final segment is absent and an error when an
/// earlier segment lands on a missing or null value.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Value>, FieldPathError> {
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    resolve_segments(root, path, &segments)
}

fn resolve_segments<'a>(
    root: &'a Value,
    path: &str,
    segments: &[String],
) -> Result<Option<&'a Value>, FieldPathError> {
    let mut current = Some(root);
    for segment in segments {
        current = match current {
            None | Some(Value::Null) => {
                return Err(FieldPathError {
                    path: path.to_string(),
                    segment: segment.clone(),
                })
            }
            Some(value) => lookup(value, segment),
        };
    }
    Ok(current)
}

fn lookup<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
