//! Chat over WebSocket.
//!
//! Each text frame carries one JSON event. A connection gets a bounded
//! outbound queue drained by a writer task; the read loop feeds frames to
//! the connection's [`Session`] and fires `leave` when the socket ends.
//!
//! Control replies (pongs and the close reply) reach the writer on a
//! separate channel so they are never dropped by a full event queue. The
//! writer owns the sink and closes it once both channels are drained.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use murmur_core::{ServerEvent, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::AppState;

/// How long the writer gets to flush the close reply before it is aborted.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the WebSocket router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(chat_websocket_handler))
        .with_state(state)
}

/// GET /ws
///
/// Upgrades the HTTP connection to a chat WebSocket.
async fn chat_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!("Chat WebSocket connection request");
    ws.on_upgrade(move |socket| handle_chat_websocket(socket, state))
}

/// Handle a chat WebSocket connection
async fn handle_chat_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.outbound_buffer);

    let mut session = Session::new(Arc::clone(&state.router), tx);
    let connection = session.id();
    info!(connection = %connection, "Chat WebSocket connection established");

    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    let mut writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                Some(frame) = control_rx.recv() => frame,
                Some(event) = rx.recv() => Message::Text(event.to_json()),
                else => break,
            };
            let closing = matches!(frame, Message::Close(_));
            if let Err(e) = sender.send(frame).await {
                debug!(connection = %connection, error = %e, "Failed to send WebSocket message");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection, len = text.len(), "Received chat frame");
                // Rejections are already reported to the client by the session
                let _ = session.handle_frame(&text).await;
            }
            Ok(Message::Binary(_)) => {
                warn!(connection = %connection, "Received binary WebSocket message (not supported)");
            }
            Ok(Message::Ping(data)) => {
                if control_tx.send(Message::Pong(data)).is_err() {
                    error!(connection = %connection, "Failed to send pong");
                    break;
                }
            }
            Ok(Message::Pong(_)) => {
                // Ignore pongs
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection, "WebSocket close requested");
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Err(e) => {
                error!(connection = %connection, error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.close().await;
    drop(control_tx);
    if timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
        warn!(connection = %connection, "Writer did not finish, aborting");
        writer.abort();
    }
    info!(connection = %connection, "Chat WebSocket connection closed");
}
