//! Event-to-WebSocket routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and pushes each event
//! to the connections it concerns:
//!
//! - events addressed to one user (a revoked or expired lock) go to that
//!   user only;
//! - team-scoped events (policy violations, sync conflicts, presence) go to
//!   every connected member of the team;
//! - resource events without a team (lock acquired, plain release) go to the
//!   team owning the resource.

use std::sync::Arc;

use axum::extract::ws::Message;
use profilehub_core::store::{DirectoryStore, StoreError};
use profilehub_core::types::{TeamId, UserId};
use profilehub_events::PlatformEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Who an event is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(UserId),
    Team(TeamId),
}

pub struct NotificationRouter {
    directory: Arc<dyn DirectoryStore>,
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(directory: Arc<dyn DirectoryStore>, ws_manager: Arc<WsManager>) -> Self {
        Self {
            directory,
            ws_manager,
        }
    }

    /// Run the main routing loop.
    ///
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](profilehub_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.route_event(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to route event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event. Returns the number of connections it reached.
    pub async fn route_event(&self, event: &PlatformEvent) -> Result<usize, StoreError> {
        let Some(audience) = self.determine_audience(event).await? else {
            tracing::debug!(event_type = %event.event_type, "Event has no audience");
            return Ok(0);
        };

        let message = Message::Text(
            serde_json::json!({
                "type": "event",
                "event": event,
            })
            .to_string()
            .into(),
        );

        let delivered = match &audience {
            Audience::User(user_id) => self.ws_manager.send_to_user(user_id, message).await,
            Audience::Team(team_id) => self.ws_manager.send_to_team(team_id, message).await,
        };
        tracing::debug!(
            event_type = %event.event_type,
            audience = ?audience,
            delivered,
            "Event delivered"
        );
        Ok(delivered)
    }

    /// Pick the audience of an event.
    pub async fn determine_audience(
        &self,
        event: &PlatformEvent,
    ) -> Result<Option<Audience>, StoreError> {
        if let Some(user_id) = &event.target_user_id {
            return Ok(Some(Audience::User(user_id.clone())));
        }
        if let Some(team_id) = &event.team_id {
            return Ok(Some(Audience::Team(team_id.clone())));
        }
        match &event.resource_id {
            Some(resource_id) => Ok(self
                .directory
                .get_resource(resource_id)
                .await?
                .map(|r| Audience::Team(r.team_id))),
            None => Ok(None),
        }
    }
}
