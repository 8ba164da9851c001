//! Query parameters and paginated find responses.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the nested filter object inside the request parameters.
pub const FILTER_KEY: &str = "query";
/// Offset operator understood by the remote service.
pub const SKIP_KEY: &str = "$skip";
/// Page size operator understood by the remote service.
pub const LIMIT_KEY: &str = "$limit";

/// Request parameters passed to the remote service.
///
/// The cache treats these as opaque and only ever injects `query.$skip`
/// when it pages through results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build parameters around a filter object, e.g. `{"roomId": 3, "$sort": {...}}`.
    pub fn with_filter(filter: Map<String, Value>) -> Self {
        let mut params = Map::new();
        params.insert(FILTER_KEY.to_string(), Value::Object(filter));
        Self(params)
    }

    /// Build parameters from a JSON value. Non-objects yield empty parameters.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn filter(&self) -> Option<&Map<String, Value>> {
        self.0.get(FILTER_KEY).and_then(Value::as_object)
    }

    pub fn skip(&self) -> Option<u64> {
        self.filter()
            .and_then(|f| f.get(SKIP_KEY))
            .and_then(Value::as_u64)
    }

    pub fn limit(&self) -> Option<u64> {
        self.filter()
            .and_then(|f| f.get(LIMIT_KEY))
            .and_then(Value::as_u64)
    }

    /// Copy of these parameters with `query.$skip` set to `skip`.
    ///
    /// A missing or non-object filter is replaced by one holding only the offset.
    pub fn with_skip(&self, skip: u64) -> Self {
        let mut params = self.0.clone();
        let filter = params
            .entry(FILTER_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !filter.is_object() {
            *filter = Value::Object(Map::new());
        }
        if let Value::Object(map) = filter {
            map.insert(SKIP_KEY.to_string(), Value::from(skip));
        }
        Self(params)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One page of results as returned by `find`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindPage {
    pub data: Vec<Record>,
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

impl FindPage {
    /// Wrap an unpaginated result list as a single page.
    pub fn unpaginated(data: Vec<Record>) -> Self {
        let len = data.len() as u64;
        Self {
            data,
            total: len,
            skip: 0,
            limit: len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_skip_injects_offset() {
        let query = Query::from_value(json!({ "query": { "roomId": 3 } }));
        let paged = query.with_skip(20);
        assert_eq!(paged.skip(), Some(20));
        assert_eq!(paged.filter().and_then(|f| f.get("roomId")), Some(&json!(3)));
        // the original parameters are untouched
        assert_eq!(query.skip(), None);
    }

    #[test]
    fn test_with_skip_creates_filter() {
        let paged = Query::new().with_skip(5);
        assert_eq!(paged.as_map().get("query"), Some(&json!({ "$skip": 5 })));
    }

    #[test]
    fn test_with_skip_replaces_non_object_filter() {
        let query = Query::from_value(json!({ "query": "bogus", "provider": "rest" }));
        let paged = query.with_skip(10);
        assert_eq!(paged.skip(), Some(10));
        assert_eq!(paged.as_map().get("provider"), Some(&json!("rest")));
    }

    #[test]
    fn test_limit_accessor() {
        let query = Query::from_value(json!({ "query": { "$limit": 25 } }));
        assert_eq!(query.limit(), Some(25));
    }

    #[test]
    fn test_find_page_deserialize_defaults() {
        let page: FindPage = serde_json::from_value(json!({
            "data": [{ "_id": 1 }],
            "total": 1
        }))
        .expect("page should deserialize");
        assert_eq!(page.total, 1);
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, 0);
    }

    #[test]
    fn test_find_page_unpaginated() {
        let page = FindPage::unpaginated(vec![Record::new(json!({ "_id": 1 }))]);
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 1);
    }
}
