//! Collaborator presence types and staleness rules.
//!
//! Presence is best-effort: a record is "online" only while its last
//! heartbeat falls inside the staleness window. Nothing here is durable.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{ResourceId, TeamId, Timestamp, UserId};

/// Records whose last heartbeat is older than this are offline (seconds).
pub const DEFAULT_PRESENCE_WINDOW_SECS: i64 = 90;

/// Self-reported activity state of a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
        }
    }
}

/// Last known presence of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub team_id: TeamId,
    pub status: PresenceStatus,
    /// Resource the user is currently viewing or using.
    pub current_resource: Option<ResourceId>,
    pub last_seen: Timestamp,
}

impl PresenceRecord {
    /// Whether the last heartbeat is outside `window` as of `now`.
    pub fn is_stale(&self, now: Timestamp, window: Duration) -> bool {
        now - self.last_seen > window
    }

    /// True when status or current resource differ, i.e. something worth
    /// broadcasting. A bare `last_seen` refresh is not a change.
    pub fn differs_visibly(&self, other: &PresenceRecord) -> bool {
        self.status != other.status || self.current_resource != other.current_resource
    }
}

/// Longest heartbeat interval that cannot let a lock of `ttl` expire during
/// normal use.
pub fn max_heartbeat_interval(ttl: Duration) -> Duration {
    ttl / 2
}
