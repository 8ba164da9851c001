//! WebSocket event feed with reconnect backoff.
//!
//! One feed per connection. Text frames are decoded into service events and
//! fanned out to per-service broadcast channels, which is what every
//! `RemoteCollection` hands to its caches as the event subscription.

use crate::config::{ClientConfig, ReconnectConfig};
use crate::error::{ClientError, ClientResult};
use crate::rest::build_auth_headers;
use futures_util::StreamExt;
use livequery_core::{EventKind, EventReceiver, Record, ServiceEvent};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// FRAMES
// ============================================================================

/// A decoded realtime event addressed to one service.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub service: String,
    pub event: ServiceEvent,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Envelope {
        service: String,
        event: String,
        data: Value,
    },
    Pair(String, Value),
}

/// Decode one text frame.
///
/// Accepts `{"service": .., "event": .., "data": ..}` envelopes and
/// `["<service> <event>", data]` pairs. Events other than
/// created/updated/patched/removed decode to `None`.
pub fn decode_frame(text: &str) -> ClientResult<Option<Frame>> {
    let (service, event, data) = match serde_json::from_str::<RawFrame>(text)? {
        RawFrame::Envelope {
            service,
            event,
            data,
        } => (service, event, data),
        RawFrame::Pair(path, data) => {
            let (service, event) = path.rsplit_once(' ').ok_or_else(|| {
                ClientError::InvalidResponse(format!("event path '{}' has no event name", path))
            })?;
            (service.to_string(), event.to_string(), data)
        }
    };

    let Some(kind) = EventKind::parse(&event) else {
        return Ok(None);
    };
    if !data.is_object() {
        return Err(ClientError::InvalidResponse(format!(
            "{} {} payload is not a record",
            service, event
        )));
    }
    Ok(Some(Frame {
        service: normalize_service(&service),
        event: ServiceEvent::new(kind, Record::new(data)),
    }))
}

/// Service names are compared without surrounding slashes.
pub fn normalize_service(name: &str) -> String {
    name.trim_matches('/').to_string()
}

// ============================================================================
// ROUTER
// ============================================================================

/// Fan-out of decoded events to per-service broadcast channels.
pub struct EventRouter {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<ServiceEvent>>>,
}

impl EventRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Sender for `service`, creating its channel on first use.
    pub fn sender(&self, service: &str) -> broadcast::Sender<ServiceEvent> {
        let key = normalize_service(service);
        if let Some(sender) = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return sender.clone();
        }
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, service: &str) -> EventReceiver {
        self.sender(service).subscribe()
    }

    /// Deliver `frame` to its service's subscribers. Returns how many were reached.
    pub fn route(&self, frame: Frame) -> usize {
        let sender = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&frame.service)
            .cloned();
        match sender {
            Some(sender) => sender.send(frame.event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn dispatch(router: &EventRouter, text: &str) {
    match decode_frame(text) {
        Ok(Some(frame)) => {
            let service = frame.service.clone();
            let kind = frame.event.kind;
            let reached = router.route(frame);
            tracing::trace!(service = %service, event = %kind, reached, "Realtime event routed");
        }
        Ok(None) => {
            tracing::debug!("Ignoring non-CRUD realtime event");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Skipping undecodable realtime frame");
        }
    }
}

// ============================================================================
// FEED
// ============================================================================

#[derive(Clone)]
pub struct WsClient {
    endpoint: String,
    auth: HeaderMap,
    reconnect: ReconnectConfig,
}

impl WsClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            endpoint: config.ws_endpoint.clone(),
            auth: build_auth_headers(&config.auth)?,
            reconnect: config.reconnect.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn connect(&self) -> ClientResult<WsStream> {
        let mut request = self.endpoint.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in self.auth.iter() {
            headers.insert(name, value.clone());
        }
        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(stream)
    }

    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.reconnect
    }
}

/// Run the feed until `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_feed(
    ws: WsClient,
    router: Arc<EventRouter>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = ws.reconnect_config().initial_ms;
        'feed: loop {
            if *shutdown.borrow() {
                break;
            }
            let connected = tokio::select! {
                _ = shutdown.changed() => break 'feed,
                result = ws.connect() => result,
            };

            match connected {
                Ok(mut stream) => {
                    tracing::info!(endpoint = %ws.endpoint(), "Realtime feed connected");
                    backoff = ws.reconnect_config().initial_ms;
                    loop {
                        let message = tokio::select! {
                            _ = shutdown.changed() => {
                                let _ = stream.close(None).await;
                                break 'feed;
                            }
                            message = stream.next() => message,
                        };
                        match message {
                            Some(Ok(Message::Text(text))) => dispatch(&router, &text),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                tracing::warn!(error = %err, "Realtime stream error");
                                break;
                            }
                        }
                    }
                    tracing::warn!(endpoint = %ws.endpoint(), "Realtime feed disconnected");
                }
                Err(err) => {
                    tracing::warn!(endpoint = %ws.endpoint(), error = %err, "Realtime connect failed");
                }
            }

            let delay = jittered_backoff(backoff, ws.reconnect_config().jitter_ms);
            tokio::select! {
                _ = shutdown.changed() => break 'feed,
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
            backoff = next_backoff(backoff, ws.reconnect_config());
        }
        tracing::info!(endpoint = %ws.endpoint(), "Realtime feed stopped");
    })
}

fn next_backoff(current_ms: u64, config: &ReconnectConfig) -> u64 {
    let next = (current_ms as f64 * config.multiplier) as u64;
    next.min(config.max_ms)
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}
