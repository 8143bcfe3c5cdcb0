//! WebSocket observer endpoint
//!
//! Each socket is registered in the hub's global scope for its lifetime.
//! A writer task drains the connection's outbox into the socket while the
//! reader handles subscription requests; whichever finishes first ends the
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use super::state::AppState;
use crate::hub::{ClientMessage, Connection, Outbound};

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbox) = state.hub.register().await;
    let conn_id = conn.id();

    let mut send_task = tokio::spawn(async move {
        while let Some(item) = outbox.recv().await {
            match item {
                Outbound::Frame(frame) => {
                    let text = String::from_utf8_lossy(&frame).into_owned();
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => handle_message(&recv_state, &recv_conn, &text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(connection_id = %recv_conn.id(), error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(&conn_id).await;
}

async fn handle_message(state: &AppState, conn: &Connection, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %conn.id(), error = %e, "Ignoring malformed message");
            return;
        }
    };

    match message {
        ClientMessage::SubscribeCamera { camera_id } => {
            let subscribed = state.supervisor.subscribe(&camera_id, conn.clone()).await;
            tracing::debug!(
                connection_id = %conn.id(),
                camera_id = %camera_id,
                subscribed = subscribed,
                "Subscribe request"
            );
        }
        ClientMessage::UnsubscribeCamera { camera_id } => {
            state.supervisor.unsubscribe(&camera_id, conn).await;
        }
    }
}
