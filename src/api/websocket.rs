//! `/data_plugins` WebSocket hub
//!
//! Clients (the in-process frame broadcaster and any dashboard) connect
//! here. Inbound text is decoded once at the boundary; recognized
//! spectral frames are relayed to every other hub subscriber, anything
//! else is dropped.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use super::shared::SharedStateHandle;
use super::types::WireMessage;

/// WebSocket upgrade handler for the data hub
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedStateHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual hub connection
async fn handle_socket(socket: WebSocket, state: SharedStateHandle) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = state.subscribe();

    tracing::info!("Hub client connected");

    // Inbound: decode at the boundary, relay spectral frames
    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<WireMessage>(&text) {
                    Ok(WireMessage::Spectral { value }) if !value.is_empty() => {
                        recv_state.broadcast_frame(text);
                    }
                    Ok(WireMessage::Spectral { .. }) => {
                        tracing::debug!("Dropping empty spectral frame");
                    }
                    Ok(WireMessage::Unknown) => {
                        tracing::trace!("Ignoring unrecognized hub message");
                    }
                    Err(e) => {
                        tracing::debug!("Discarding malformed hub message: {}", e);
                    }
                },
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by axum
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Hub client requested close");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Hub receive error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Outbound: forward relayed frames to this client
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break; // Client disconnected
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    // Meters show current state; skipping stale frames is fine
                    tracing::debug!("Hub client lagged, skipped {} frames", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = recv_task => {},
        _ = send_task => {},
    }

    tracing::info!("Hub client disconnected");
}
