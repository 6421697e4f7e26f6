use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use profilehub_core::types::{TeamId, Timestamp, UserId};
use tokio::sync::{mpsc, RwLock};

/// Interval between keepalive pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single authenticated WebSocket connection.
pub struct WsConnection {
    pub user_id: UserId,
    pub team_id: TeamId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. A user may hold several connections
/// (one per tab or device).
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: UserId,
        team_id: TeamId,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            team_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Find all connection IDs associated with a given user.
    pub async fn get_by_user(&self, user_id: &str) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.user_id == user_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Send a message to all connections belonging to a specific user.
    ///
    /// Returns the number of open connections the message was queued on.
    pub async fn send_to_user(&self, user_id: &str, message: Message) -> usize {
        self.send_where(|conn| conn.user_id == user_id, message).await
    }

    /// Send a message to every connection of every member of a team.
    ///
    /// Returns the number of open connections the message was queued on.
    pub async fn send_to_team(&self, team_id: &str, message: Message) -> usize {
        self.send_where(|conn| conn.team_id == team_id, message).await
    }

    async fn send_where(&self, pred: impl Fn(&WsConnection) -> bool, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| pred(c)) {
            if conn.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Ping every connection and drop the ones whose socket task is gone.
    ///
    /// A connection whose receiver was dropped without `remove` (the socket
    /// task panicked or was aborted) would otherwise keep counting towards
    /// team fan-out forever. Returns the ids that were pruned.
    pub async fn ping_all(&self) -> Vec<String> {
        let mut conns = self.connections.write().await;
        let dead: Vec<String> = conns
            .iter()
            .filter(|(_, conn)| conn.sender.send(Message::Ping(Bytes::new())).is_err())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            if let Some(conn) = conns.remove(id) {
                tracing::debug!(
                    conn_id = %id,
                    user_id = %conn.user_id,
                    connected_at = %conn.connected_at,
                    "Pruned dead WebSocket connection"
                );
            }
        }
        dead
    }
}

/// Spawn the keepalive task: ping all connections every 30 seconds and
/// prune the dead ones.
///
/// The task loops forever; abort the returned handle during shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            let pruned = ws_manager.ping_all().await;
            if !pruned.is_empty() {
                let remaining = ws_manager.connection_count().await;
                tracing::info!(
                    pruned = pruned.len(),
                    remaining = remaining,
                    "Pruned WebSocket connections with closed channels"
                );
            }
        }
    })
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
