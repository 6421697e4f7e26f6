//! Repository for the `resource_locks` table.

use profilehub_core::locking::Lock;
use sqlx::PgPool;

use crate::models::lock::ResourceLockRow;

/// Column list for `resource_locks` queries.
const LOCK_COLUMNS: &str = "resource_id, holder, acquired_at, expires_at, reason, version";

/// Versioned lock slots. Every write is conditional on the version the
/// caller last read.
pub struct ResourceLockRepo;

impl ResourceLockRepo {
    /// Fetch the slot row, or `None` if the resource was never locked.
    pub async fn find(
        pool: &PgPool,
        resource_id: &str,
    ) -> Result<Option<ResourceLockRow>, sqlx::Error> {
        let query = format!("SELECT {LOCK_COLUMNS} FROM resource_locks WHERE resource_id = $1");
        sqlx::query_as::<_, ResourceLockRow>(&query)
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }

    /// Create the slot at version 1.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING`, so a concurrent creator
    /// makes this a no-op. Returns whether the row was inserted.
    pub async fn insert_first(
        pool: &PgPool,
        resource_id: &str,
        next: Option<&Lock>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO resource_locks \
                (resource_id, holder, acquired_at, expires_at, reason, version) \
             VALUES ($1, $2, $3, $4, $5, 1) \
             ON CONFLICT (resource_id) DO NOTHING",
        )
        .bind(resource_id)
        .bind(next.map(|l| l.holder.as_str()))
        .bind(next.map(|l| l.acquired_at))
        .bind(next.map(|l| l.expires_at))
        .bind(next.and_then(|l| l.reason.as_deref()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Overwrite the slot if its version is still `expected_version`,
    /// bumping the version. Returns whether the row was updated.
    pub async fn compare_and_swap(
        pool: &PgPool,
        resource_id: &str,
        expected_version: i64,
        next: Option<&Lock>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE resource_locks \
             SET holder = $3, acquired_at = $4, expires_at = $5, reason = $6, \
                 version = version + 1, updated_at = NOW() \
             WHERE resource_id = $1 AND version = $2",
        )
        .bind(resource_id)
        .bind(expected_version)
        .bind(next.map(|l| l.holder.as_str()))
        .bind(next.map(|l| l.acquired_at))
        .bind(next.map(|l| l.expires_at))
        .bind(next.and_then(|l| l.reason.as_deref()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
