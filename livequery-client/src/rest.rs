//! REST transport for remote collections.
//!
//! Every service is addressed as `{base_url}/{service}`; single records as
//! `{base_url}/{service}/{id}`. Query filters travel in the query string,
//! nested objects flattened with bracket notation (`a[b]=1`).

use crate::config::{AuthConfig, ClientConfig, ConfigError};
use crate::error::{ClientError, ClientResult};
use livequery_core::{FindPage, Query, Record, RecordId};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: Url,
    auth_header: HeaderMap,
}

/// `find` responses are either a page envelope or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum FindResponse {
    List(Vec<Record>),
    Page(FindPage),
}

/// Error body returned by the server on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    name: Option<String>,
    message: String,
}

impl RestTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url =
            Url::parse(&config.base_url).map_err(|e| ClientError::Url(e.to_string()))?;
        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url,
            auth_header,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn find(&self, service: &str, query: &Query) -> ClientResult<FindPage> {
        let url = self.url(service, None)?;
        let response: FindResponse = self.send(Method::GET, url, query, None).await?;
        Ok(match response {
            FindResponse::Page(page) => page,
            FindResponse::List(data) => FindPage::unpaginated(data),
        })
    }

    pub async fn get(&self, service: &str, id: &RecordId, query: &Query) -> ClientResult<Record> {
        let url = self.url(service, Some(id))?;
        self.send(Method::GET, url, query, None).await
    }

    pub async fn create(&self, service: &str, data: &Value, query: &Query) -> ClientResult<Record> {
        let url = self.url(service, None)?;
        self.send(Method::POST, url, query, Some(data)).await
    }

    pub async fn update(
        &self,
        service: &str,
        id: &RecordId,
        data: &Value,
        query: &Query,
    ) -> ClientResult<Record> {
        let url = self.url(service, Some(id))?;
        self.send(Method::PUT, url, query, Some(data)).await
    }

    pub async fn patch(
        &self,
        service: &str,
        id: &RecordId,
        data: &Value,
        query: &Query,
    ) -> ClientResult<Record> {
        let url = self.url(service, Some(id))?;
        self.send(Method::PATCH, url, query, Some(data)).await
    }

    pub async fn remove(&self, service: &str, id: &RecordId, query: &Query) -> ClientResult<Record> {
        let url = self.url(service, Some(id))?;
        self.send(Method::DELETE, url, query, None).await
    }

    /// Resolve the URL of a service, or of one record within it.
    pub fn url(&self, service: &str, id: Option<&RecordId>) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Url(format!("{} cannot be a base", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(service.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(&id.to_path_segment());
            }
        }
        Ok(url)
    }

    async fn send<T>(
        &self,
        method: Method,
        url: Url,
        query: &Query,
        body: Option<&Value>,
    ) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut request = self
            .client
            .request(method, url)
            .headers(self.auth_header.clone());
        let params = query_pairs(query);
        if !params.is_empty() {
            request = request.query(&params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        let text = response.text().await?;
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
            return Err(ClientError::Server {
                status: status.as_u16(),
                name: body.name,
                message: body.message,
            });
        }
        Err(ClientError::Server {
            status: status.as_u16(),
            name: None,
            message: text,
        })
    }
}

// ============================================================================
// QUERY STRING
// ============================================================================

/// Flatten the filter of `query` into query-string pairs.
///
/// Only the `query` member travels to the server; other parameters are local.
pub fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(filter) = query.filter() {
        for (key, value) in filter {
            flatten(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(format!("{}[{}]", prefix, key), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten(format!("{}[{}]", prefix, index), nested, out);
            }
        }
        Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}

// ============================================================================
// AUTH
// ============================================================================

pub(crate) fn build_auth_headers(auth: &AuthConfig) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| invalid_header("auth.api_key", e))?,
        );
    }
    if let Some(jwt) = &auth.jwt {
        let value = format!("Bearer {}", jwt);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| invalid_header("auth.jwt", e))?,
        );
    }
    Ok(headers)
}

fn invalid_header(field: &'static str, err: reqwest::header::InvalidHeaderValue) -> ClientError {
    ClientError::Config(ConfigError::InvalidValue {
        field,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use serde_json::json;

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.to_string(),
            ws_endpoint: "ws://localhost:3030".to_string(),
            auth: AuthConfig {
                api_key: Some("key".to_string()),
                jwt: Some("token".to_string()),
            },
            request_timeout_ms: 1_000,
            reconnect: ReconnectConfig {
                initial_ms: 100,
                max_ms: 1_000,
                multiplier: 2.0,
                jitter_ms: 0,
            },
            event_buffer: 16,
        }
    }

    #[test]
    fn test_service_urls() {
        let rest = RestTransport::new(&config("http://localhost:3030/api/")).expect("transport");
        let url = rest.url("messages", None).expect("url");
        assert_eq!(url.as_str(), "http://localhost:3030/api/messages");

        let url = rest
            .url("admin/users", Some(&RecordId::from("a b")))
            .expect("url");
        assert_eq!(url.as_str(), "http://localhost:3030/api/admin/users/a%20b");

        let url = rest.url("messages", Some(&RecordId::from(7))).expect("url");
        assert_eq!(url.as_str(), "http://localhost:3030/api/messages/7");
    }

    #[test]
    fn test_query_pairs_flatten_nested_filters() {
        let query = Query::from_value(json!({
            "query": {
                "type": "a",
                "$skip": 20,
                "tags": { "$in": ["x", "y"] },
            },
            "local": true,
        }));
        let mut pairs = query_pairs(&query);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("$skip".to_string(), "20".to_string()),
                ("tags[$in][0]".to_string(), "x".to_string()),
                ("tags[$in][1]".to_string(), "y".to_string()),
                ("type".to_string(), "a".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_without_filter() {
        assert!(query_pairs(&Query::new()).is_empty());
    }

    #[test]
    fn test_auth_headers() {
        let headers = build_auth_headers(&config("http://localhost").auth).expect("headers");
        assert_eq!(headers.get("x-api-key").map(|v| v.as_bytes()), Some(&b"key"[..]));
        assert_eq!(
            headers.get("authorization").map(|v| v.as_bytes()),
            Some(&b"Bearer token"[..])
        );
    }

    #[test]
    fn test_find_response_shapes() {
        let page: FindResponse =
            serde_json::from_value(json!({ "total": 1, "limit": 10, "skip": 0, "data": [{ "_id": 1 }] }))
                .expect("page");
        assert!(matches!(page, FindResponse::Page(ref p) if p.total == 1));

        let list: FindResponse = serde_json::from_value(json!([{ "_id": 1 }, { "_id": 2 }]))
            .expect("list");
        assert!(matches!(list, FindResponse::List(ref l) if l.len() == 2));

        let empty: FindResponse = serde_json::from_value(json!([])).expect("empty list");
        assert!(matches!(empty, FindResponse::List(ref l) if l.is_empty()));
    }
}
