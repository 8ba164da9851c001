//! Records mirrored from a remote collection.
//!
//! A record is an opaque JSON value. The cache only ever looks at its
//! identifier and at fields referenced by channel predicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of the identifier field carried by every record.
pub const ID_FIELD: &str = "_id";

/// Identifier of a record, as the server reports it.
///
/// Servers use strings (object ids) or integers, so the raw JSON value is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Value);

impl RecordId {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Render the identifier as a URL path segment.
    pub fn to_path_segment(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_segment())
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

/// A single item of a remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Raw identifier value, `None` when the record carries no `_id`.
    pub fn id_value(&self) -> Option<&Value> {
        self.0.get(ID_FIELD)
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id_value().cloned().map(RecordId)
    }

    /// Whether both records carry the same identifier.
    ///
    /// Two records without an identifier compare as the same record.
    pub fn same_id(&self, other: &Record) -> bool {
        self.id_value() == other.id_value()
    }

    /// Shorthand for a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_extraction() {
        let record = Record::new(json!({ "_id": "a1", "text": "hello" }));
        assert_eq!(record.id(), Some(RecordId::from("a1")));
        assert_eq!(record.get("text"), Some(&json!("hello")));
    }

    #[test]
    fn test_record_without_id() {
        let record = Record::new(json!({ "text": "hello" }));
        assert!(record.id().is_none());
        assert!(record.same_id(&Record::new(json!({ "other": 1 }))));
    }

    #[test]
    fn test_same_id_distinguishes_types() {
        let numeric = Record::new(json!({ "_id": 1 }));
        let textual = Record::new(json!({ "_id": "1" }));
        assert!(!numeric.same_id(&textual));
    }

    #[test]
    fn test_record_id_path_segment() {
        assert_eq!(RecordId::from("abc").to_path_segment(), "abc");
        assert_eq!(RecordId::from(42).to_path_segment(), "42");
        assert_eq!(RecordId::from(7).to_string(), "7");
    }

    #[test]
    fn test_record_serde_is_transparent() {
        let record: Record = serde_json::from_str(r#"{"_id":"x","n":2}"#)
            .expect("record should deserialize");
        let encoded = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(encoded, json!({ "_id": "x", "n": 2 }));
    }
}
