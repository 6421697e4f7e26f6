//! Lock slot row model.

use profilehub_core::locking::{Lock, LockSlot};
use profilehub_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `resource_locks` table.
///
/// A cleared slot keeps its row (and version) with the holder columns set
/// to NULL.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceLockRow {
    pub resource_id: String,
    pub holder: Option<String>,
    pub acquired_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub reason: Option<String>,
    pub version: i64,
}

impl ResourceLockRow {
    pub fn into_slot(self) -> LockSlot {
        let lock = match (self.holder, self.acquired_at, self.expires_at) {
            (Some(holder), Some(acquired_at), Some(expires_at)) => Some(Lock {
                resource_id: self.resource_id,
                holder,
                acquired_at,
                expires_at,
                reason: self.reason,
            }),
            _ => None,
        };
        LockSlot {
            lock,
            version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn cleared_row_maps_to_empty_slot() {
        let row = ResourceLockRow {
            resource_id: "p1".into(),
            holder: None,
            acquired_at: None,
            expires_at: None,
            reason: None,
            version: 4,
        };
        let slot = row.into_slot();
        assert!(slot.lock.is_none());
        assert_eq!(slot.version, 4);
    }

    #[test]
    fn held_row_maps_to_lock() {
        let now = Utc::now();
        let row = ResourceLockRow {
            resource_id: "p1".into(),
            holder: Some("alice".into()),
            acquired_at: Some(now),
            expires_at: Some(now + Duration::seconds(300)),
            reason: Some("editing".into()),
            version: 1,
        };
        let lock = row.into_slot().lock.unwrap();
        assert_eq!(lock.holder, "alice");
        assert_eq!(lock.reason.as_deref(), Some("editing"));
    }
}
