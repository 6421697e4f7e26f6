use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use profilehub_core::presence::PresenceStatus;
use serde::Deserialize;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Frames a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Same as `POST /presence/heartbeat`.
    Heartbeat {
        #[serde(default)]
        status: Option<PresenceStatus>,
        #[serde(default)]
        current_resource: Option<String>,
    },
}

/// HTTP handler that upgrades an authenticated connection to WebSocket.
///
/// The caller is identified before the upgrade; unauthenticated requests
/// get a 401 and never reach the socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound messages on the current task.
///   4. Cleans up on disconnect, signing the user off once their last
///      connection closes.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let ws_manager = state.ws_manager.clone();
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user.user_id, "WebSocket connected");

    let mut rx = ws_manager
        .add(conn_id.clone(), user.user_id.clone(), user.team_id.clone())
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &user, &conn_id, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();

    if ws_manager.get_by_user(&user.user_id).await.is_empty() {
        state.services.presence.leave(&user.user_id).await;
    }
    tracing::info!(conn_id = %conn_id, user_id = %user.user_id, "WebSocket disconnected");
}

async fn handle_client_message(state: &AppState, user: &AuthUser, conn_id: &str, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Ignoring unrecognised WebSocket frame");
            return;
        }
    };

    match message {
        ClientMessage::Heartbeat {
            status,
            current_resource,
        } => {
            if let Some(resource_id) = &current_resource {
                let same_team = state
                    .services
                    .policies
                    .get_resource(resource_id)
                    .await
                    .is_ok_and(|r| r.team_id == user.team_id);
                if !same_team {
                    tracing::debug!(conn_id, resource_id, "Heartbeat names a foreign resource");
                    return;
                }
            }
            state
                .services
                .presence
                .heartbeat(
                    &user.user_id,
                    &user.team_id,
                    status.unwrap_or(PresenceStatus::Online),
                    current_resource,
                )
                .await;
        }
    }
}
