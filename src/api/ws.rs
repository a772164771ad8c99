//! Live event feed over WebSocket
//!
//! Subscribes the socket to the broadcast bus (with replay when a
//! request id is given) and forwards events as JSON text frames until
//! the client disconnects.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::pipeline::Coordinator;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Restrict the feed to one request and replay its recent events.
    #[serde(default)]
    pub request_id: Option<Uuid>,
    /// Comma-separated event kind names to deliver.
    #[serde(default)]
    pub kinds: Option<String>,
}

/// GET /ws/events — upgrade and stream bus events.
pub async fn events_feed(
    State(coordinator): State<Arc<Coordinator>>,
    Query(query): Query<FeedQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| stream_events(socket, coordinator, query))
}

async fn stream_events(mut socket: WebSocket, coordinator: Arc<Coordinator>, query: FeedQuery) {
    let kinds = query
        .kinds
        .map(|raw| raw.split(',').map(|k| k.trim().to_string()).collect::<Vec<_>>());

    let bus = &coordinator.context().bus;
    let mut subscription = match query.request_id {
        Some(id) => bus.subscribe_with_replay(kinds, Some(id)),
        None => bus.subscribe(kinds, None),
    };

    debug!(subscriber = subscription.id, "WebSocket event feed opened");
    loop {
        tokio::select! {
            event = subscription.rx.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                // Any close/error from the client ends the feed
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
    debug!(subscriber = subscription.id, "WebSocket event feed closed");
}
