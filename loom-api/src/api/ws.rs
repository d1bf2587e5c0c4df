//! Per-dream status WebSocket
//!
//! A client opens `/ws/dream-status/{dream_id}` while a dream is being
//! processed and receives the pipeline's status updates for that dream.
//! The server never expects inbound messages on this channel; the read
//! side exists only to notice the disconnect.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

/// GET /ws/dream-status/:dream_id — upgrade and hand off to the socket task
pub async fn dream_status_ws(
    ws: WebSocketUpgrade,
    Path(dream_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, dream_id))
}

/// Per-socket task: registry → sink forwarding, read loop for disconnect
async fn handle_socket(socket: WebSocket, state: AppState, dream_id: i64) {
    debug!(dream_id, "Status WebSocket connected");

    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let handle = state.registry.register(dream_id, update_tx);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            update = update_rx.recv() => {
                let Some(update) = update else {
                    // Registry dropped this connection
                    break;
                };
                let Ok(text) = serde_json::to_string(&update) else {
                    continue;
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    // Inbound payloads are ignored; the channel is push-only
                    Some(Ok(_)) => {}
                    // Disconnect or transport error ends the session
                    _ => break,
                }
            }
        }
    }

    state.registry.unregister(handle);
    debug!(dream_id, "Status WebSocket disconnected");
}
