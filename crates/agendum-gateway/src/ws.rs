//! WebSocket handler — streams live events to connected clients.
//!
//! Each connection subscribes to the shared [`LiveEventHub`]; every event the
//! dispatcher broadcasts is forwarded as one JSON text frame.
//!
//! Protocol:
//! ← Server sends: {"type":"connected","version":"..."}
//! ← Server sends: {"type":"event","event":"appointment_reminder","title":"...","message":"..."}
//! → Client sends: {"type":"ping"} → ← {"type":"pong"}

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::server::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("WebSocket client connected");
    let mut events = state.hub.subscribe();

    let welcome = serde_json::json!({
        "type": "connected",
        "message": "Agendum Gateway — WebSocket connected",
        "version": env!("CARGO_PKG_VERSION"),
    });
    if send_json(&mut socket, &welcome).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ev) => {
                    let frame = serde_json::json!({
                        "type": "event",
                        "event": ev.event,
                        "title": ev.title,
                        "message": ev.message,
                    });
                    if send_json(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("WS client lagged, {missed} event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            },

            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let json: serde_json::Value =
                        serde_json::from_str(&text).unwrap_or_default();
                    if json["type"].as_str() == Some("ping") {
                        let pong = serde_json::json!({
                            "type": "pong",
                            "timestamp": chrono::Utc::now().timestamp_millis(),
                        });
                        let _ = send_json(&mut socket, &pong).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = socket.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("WebSocket client disconnected");
                    break;
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {e}");
                    break;
                }
                _ => {}
            }
        }
    }

    tracing::info!("WebSocket connection closed");
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), ()> {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .map_err(|e| {
            tracing::error!("WS send failed: {e}");
        })
}
