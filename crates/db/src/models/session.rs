//! Session snapshot row model.
//!
//! Entries are stored as a JSONB list of flat records, the same shape the
//! API returns, so a snapshot can be inspected directly in SQL.

use profilehub_core::session::{entry_map, SessionSnapshot};
use profilehub_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `session_snapshots` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionSnapshotRow {
    pub resource_id: String,
    pub entries: serde_json::Value,
    pub version: i64,
    pub content_hash: String,
    pub updated_at: Option<Timestamp>,
}

/// Column values for writing a snapshot.
#[derive(Debug, Clone)]
pub struct SessionSnapshotValues {
    pub entries: serde_json::Value,
    pub version: i64,
}

/// Stored JSON or version that cannot be mapped to a snapshot.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid session snapshot: {0}")]
pub struct SnapshotDecodeError(pub String);

impl SessionSnapshotRow {
    pub fn into_snapshot(self) -> Result<SessionSnapshot, SnapshotDecodeError> {
        let entries = entry_map::deserialize(self.entries)
            .map_err(|e| SnapshotDecodeError(format!("{}: {e}", self.resource_id)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| SnapshotDecodeError(format!("negative version {}", self.version)))?;
        Ok(SessionSnapshot {
            resource_id: self.resource_id,
            entries,
            version,
            content_hash: self.content_hash,
            updated_at: self.updated_at,
        })
    }
}

impl SessionSnapshotValues {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Result<Self, SnapshotDecodeError> {
        let entries = entry_map::serialize(&snapshot.entries, serde_json::value::Serializer)
            .map_err(|e| SnapshotDecodeError(e.to_string()))?;
        let version = i64::try_from(snapshot.version)
            .map_err(|_| SnapshotDecodeError(format!("version {} overflows", snapshot.version)))?;
        Ok(Self { entries, version })
    }
}
