//! Best-effort collaborator presence.
//!
//! A time-windowed cache keyed by user id. Nothing is persisted and nothing
//! sweeps the cache in the background: stale records are dropped the next
//! time a team listing reads past them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use profilehub_core::clock::Clock;
use profilehub_core::presence::{PresenceRecord, PresenceStatus};
use profilehub_core::types::{ResourceId, UserId};
use profilehub_events::{event_types, EventBus, PlatformEvent};
use tokio::sync::RwLock;

pub struct PresenceService {
    records: RwLock<HashMap<UserId, PresenceRecord>>,
    window: Duration,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl PresenceService {
    pub fn new(window_secs: i64, events: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            window: Duration::seconds(window_secs),
            events,
            clock,
        }
    }

    /// Upsert the caller's presence with `last_seen = now`.
    ///
    /// Publishes `presence.changed` when the user was offline (absent or
    /// stale) or when their status or current resource moved.
    pub async fn heartbeat(
        &self,
        user_id: &str,
        team_id: &str,
        status: PresenceStatus,
        current_resource: Option<ResourceId>,
    ) -> PresenceRecord {
        let now = self.clock.now();
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
            status,
            current_resource,
            last_seen: now,
        };

        let previous = {
            let mut records = self.records.write().await;
            records.insert(user_id.to_string(), record.clone())
        };

        let changed = match &previous {
            None => true,
            Some(prev) => prev.is_stale(now, self.window) || prev.differs_visibly(&record),
        };
        if changed {
            tracing::debug!(
                user_id,
                team_id,
                status = record.status.as_str(),
                "Presence changed"
            );
            self.publish_change(&record, true);
        }
        record
    }

    /// Users of `team_id` seen within the window, ordered by user id.
    ///
    /// Stale records of that team are pruned as a side effect.
    pub async fn list_online(&self, team_id: &str) -> Vec<PresenceRecord> {
        let now = self.clock.now();
        let window = self.window;

        let has_stale = {
            let records = self.records.read().await;
            records
                .values()
                .any(|r| r.team_id == team_id && r.is_stale(now, window))
        };
        if has_stale {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|_, r| r.team_id != team_id || !r.is_stale(now, window));
            tracing::debug!(team_id, pruned = before - records.len(), "Pruned stale presence");
        }

        let records = self.records.read().await;
        let mut online: Vec<PresenceRecord> = records
            .values()
            .filter(|r| r.team_id == team_id && !r.is_stale(now, window))
            .cloned()
            .collect();
        online.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        online
    }

    /// Explicit sign-off. Returns whether the user had a record.
    pub async fn leave(&self, user_id: &str) -> bool {
        let removed = self.records.write().await.remove(user_id);
        match removed {
            Some(record) => {
                tracing::debug!(user_id, team_id = %record.team_id, "Presence left");
                self.publish_change(&record, false);
                true
            }
            None => false,
        }
    }

    fn publish_change(&self, record: &PresenceRecord, online: bool) {
        self.events.publish(
            PlatformEvent::new(event_types::PRESENCE_CHANGED)
                .with_team(record.team_id.clone())
                .with_actor(record.user_id.clone())
                .with_payload(serde_json::json!({
                    "online": online,
                    "status": record.status,
                    "current_resource": record.current_resource,
                }))
                .at(self.clock.now()),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
