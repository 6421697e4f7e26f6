//! Repository for the `session_snapshots` table.

use profilehub_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::session::{SessionSnapshotRow, SessionSnapshotValues};

/// Column list for `session_snapshots` queries.
const SNAPSHOT_COLUMNS: &str = "resource_id, entries, version, content_hash, updated_at";

pub struct SessionSnapshotRepo;

impl SessionSnapshotRepo {
    pub async fn find(
        pool: &PgPool,
        resource_id: &str,
    ) -> Result<Option<SessionSnapshotRow>, sqlx::Error> {
        let query =
            format!("SELECT {SNAPSHOT_COLUMNS} FROM session_snapshots WHERE resource_id = $1");
        sqlx::query_as::<_, SessionSnapshotRow>(&query)
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }

    /// Write a snapshot at `values.version`.
    ///
    /// Version 1 is an insert that yields to any existing row; later
    /// versions only replace the row holding `values.version - 1`.
    /// Returns whether the write took effect.
    pub async fn compare_and_swap(
        pool: &PgPool,
        resource_id: &str,
        values: &SessionSnapshotValues,
        content_hash: &str,
        updated_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = if values.version == 1 {
            sqlx::query(
                "INSERT INTO session_snapshots \
                    (resource_id, entries, version, content_hash, updated_at) \
                 VALUES ($1, $2, 1, $3, $4) \
                 ON CONFLICT (resource_id) DO NOTHING",
            )
            .bind(resource_id)
            .bind(&values.entries)
            .bind(content_hash)
            .bind(updated_at)
            .execute(pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE session_snapshots \
                 SET entries = $2, version = $3, content_hash = $4, updated_at = $5 \
                 WHERE resource_id = $1 AND version = $3 - 1",
            )
            .bind(resource_id)
            .bind(&values.entries)
            .bind(values.version)
            .bind(content_hash)
            .bind(updated_at)
            .execute(pool)
            .await?
        };
        Ok(result.rows_affected() == 1)
    }
}
