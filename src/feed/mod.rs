//! Inbound host event feed
//!
//! HTTP surface the DJ host pushes player events into. Hosts with a
//! websocket client stream frames to `GET /feed`; hosts that can only issue
//! requests batch events to `POST /events`. Default port: 8126.
//!
//! Everything accepted funnels into one bounded channel consumed by the
//! binary's event loop. A full channel drops the event instead of blocking
//! the host; the next periodic status heals the loss.

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::events::PlayerEvent;

/// Default feed bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8126";

/// Events queued between the feed and the dispatcher before new ones drop
const CHANNEL_CAPACITY: usize = 256;

/// The channel pair wiring the feed into the event loop
pub fn channel() -> (mpsc::Sender<PlayerEvent>, mpsc::Receiver<PlayerEvent>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Shared state for feed handlers
#[derive(Clone)]
pub struct FeedState {
    events: mpsc::Sender<PlayerEvent>,
}

impl FeedState {
    pub fn new(events: mpsc::Sender<PlayerEvent>) -> Self {
        Self { events }
    }

    /// Hand one event to the dispatcher loop, dropping on overflow
    fn push(&self, event: PlayerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(ev)) => {
                warn!(
                    "⚠️ event queue full, dropping event for device {}",
                    ev.device()
                );
            },
            Err(TrySendError::Closed(_)) => {
                debug!("event loop gone, feed input ignored");
            },
        }
    }
}

/// Feed error response
#[derive(Debug, Serialize)]
struct FeedError {
    error: String,
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// `POST /events` accepts one event or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventBody {
    One(PlayerEvent),
    Many(Vec<PlayerEvent>),
}

/// Build the feed router
pub fn build_router(state: FeedState) -> Router {
    // Host scripts often run inside the player's embedded browser, so the
    // POST surface has to answer cross-origin preflights
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/feed", get(feed_ws))
        .route("/events", post(post_events))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// GET /feed - WebSocket the host streams events into, one JSON event per
/// text frame
async fn feed_ws(ws: WebSocketUpgrade, State(state): State<FeedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_feed_socket(socket, state))
}

async fn handle_feed_socket(mut socket: WebSocket, state: FeedState) {
    debug!("host connected to event feed");

    while let Some(result) = socket.recv().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<PlayerEvent>(&text) {
                Ok(event) => state.push(event),
                Err(e) => warn!("⚠️ unparseable event frame: {}", e),
            },
            Ok(Message::Ping(data)) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                warn!("feed socket error: {}", e);
                break;
            },
        }
    }

    debug!("host disconnected from event feed");
}

/// POST /events - accept a single event or an array of events
async fn post_events(
    State(state): State<FeedState>,
    body: String,
) -> Result<Json<serde_json::Value>, FeedError> {
    let parsed: EventBody = serde_json::from_str(&body).map_err(|e| FeedError {
        error: format!("invalid event payload: {}", e),
    })?;

    let events = match parsed {
        EventBody::One(event) => vec![event],
        EventBody::Many(events) => events,
    };
    let accepted = events.len();
    for event in events {
        state.push(event);
    }

    Ok(Json(serde_json::json!({ "ok": true, "accepted": accepted })))
}

/// GET /health - health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the feed server
pub async fn start_server(addr: SocketAddr, events: mpsc::Sender<PlayerEvent>) -> Result<()> {
    let router = build_router(FeedState::new(events));

    info!("🛰️ Event feed listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind event feed")?;

    axum::serve(listener, router)
        .await
        .context("Event feed server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_body_single() {
        let body: EventBody = serde_json::from_str(r#"{"type":"stopped","device":2}"#).unwrap();
        match body {
            EventBody::One(PlayerEvent::Stopped { device }) => assert_eq!(device, 2),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_event_body_array() {
        let body: EventBody = serde_json::from_str(
            r#"[{"type":"stopped","device":1},{"type":"beat","device":1,"beat":4,"elapsedMs":100}]"#,
        )
        .unwrap();
        match body {
            EventBody::Many(events) => assert_eq!(events.len(), 2),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_event_body_rejects_garbage() {
        assert!(serde_json::from_str::<EventBody>(r#"{"type":"warp"}"#).is_err());
        assert!(serde_json::from_str::<EventBody>("not json").is_err());
    }

    #[tokio::test]
    async fn test_push_forwards_events() {
        let (tx, mut rx) = channel();
        let state = FeedState::new(tx);

        state.push(PlayerEvent::Stopped { device: 3 });

        assert_eq!(rx.recv().await, Some(PlayerEvent::Stopped { device: 3 }));
    }

    #[tokio::test]
    async fn test_push_drops_on_overflow_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = FeedState::new(tx);

        state.push(PlayerEvent::Stopped { device: 1 });
        state.push(PlayerEvent::Stopped { device: 2 });

        assert_eq!(rx.recv().await, Some(PlayerEvent::Stopped { device: 1 }));
        assert!(rx.try_recv().is_err());
    }
}
