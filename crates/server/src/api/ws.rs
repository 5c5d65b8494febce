//! The inbound push channel.
//!
//! The back-office gateway connects here over WebSocket and streams
//! ticket-change events as JSON text frames. Each frame is parsed into a
//! [`PushEvent`] and forwarded into the channel the update listener
//! drains; malformed frames are counted and dropped, never fatal to the
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use pledgedesk_core::PushEvent;

use crate::metrics::{PUSH_CONNECTIONS_ACTIVE, PUSH_CONNECTIONS_TOTAL, PUSH_FRAMES_RECEIVED};
use crate::state::AppState;

/// WebSocket upgrade handler for the push channel.
pub async fn push_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    PUSH_CONNECTIONS_TOTAL.inc();
    PUSH_CONNECTIONS_ACTIVE.inc();
    info!("Push channel connected");

    let push_tx = state.push_sender();

    while let Some(result) = socket.recv().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<PushEvent>(&text) {
                Ok(event) => {
                    if push_tx.send(event).await.is_err() {
                        warn!("Push listener gone, closing push channel");
                        PUSH_FRAMES_RECEIVED.with_label_values(&["dropped"]).inc();
                        break;
                    }
                    PUSH_FRAMES_RECEIVED.with_label_values(&["forwarded"]).inc();
                }
                Err(e) => {
                    warn!("Malformed push frame: {}", e);
                    PUSH_FRAMES_RECEIVED.with_label_values(&["malformed"]).inc();
                }
            },
            Ok(Message::Close(_)) => {
                debug!("Push channel requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(_) => {
                // Ignore binary and pong frames.
            }
            Err(e) => {
                warn!("Push channel receive error: {}", e);
                break;
            }
        }
    }

    PUSH_CONNECTIONS_ACTIVE.dec();
    info!("Push channel disconnected");
}
