//! Client-side error type.
//!
//! `ClientError` covers everything the HTTP and WebSocket layers can fail
//! with. It is collapsed into `TransportError` at the `RemoteService`
//! boundary so the cache never sees transport-specific types.

use crate::config::ConfigError;
use livequery_core::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Server rejected request ({status}): {message}")]
    Server {
        status: u16,
        name: Option<String>,
        message: String,
    },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid URL: {0}")]
    Url(String),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl ClientError {
    /// Collapse into the transport error reported for `service`.
    ///
    /// A 404 on a request addressing `id` becomes `NotFound`.
    pub fn into_transport(self, service: &str, id: Option<&str>) -> TransportError {
        match (self, id) {
            (ClientError::Server { status: 404, .. }, Some(id)) => TransportError::NotFound {
                service: service.to_string(),
                id: id.to_string(),
            },
            (ClientError::Server { status, message, .. }, _) => TransportError::Rejected {
                service: service.to_string(),
                status,
                message,
            },
            (ClientError::Serde(err), _) => TransportError::InvalidResponse {
                service: service.to_string(),
                reason: err.to_string(),
            },
            (ClientError::InvalidResponse(reason), _) => TransportError::InvalidResponse {
                service: service.to_string(),
                reason,
            },
            (ClientError::WebSocket(err), _) => TransportError::ConnectionClosed {
                reason: err.to_string(),
            },
            (other, _) => TransportError::RequestFailed {
                service: service.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
