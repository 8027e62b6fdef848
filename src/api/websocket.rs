//! Event relay: `POST /event` in, `GET /ws` out

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;

/// Build the event relay router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/event", post(post_event))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Accept any JSON document and broadcast it
async fn post_event(State(state): State<Arc<ApiState>>, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(event) => {
            let receivers = state.events.publish(event);
            tracing::debug!(receivers, "relayed posted event");
            Json(json!({"ok": true}))
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected posted event");
            Json(json!({"ok": false, "error": "invalid JSON"}))
        }
    }
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Stream events to one client until it closes, errors or falls behind
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    tracing::info!(clients = state.events.subscriber_count(), "overlay client connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if sender.send(Message::Text(event.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "overlay client lagging, dropping it");
                    break;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Clients only listen; drain until they go away
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!("overlay client disconnected");
}
