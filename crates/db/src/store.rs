//! [`PgStore`]: the PostgreSQL implementation of the coordination store
//! traits.

use async_trait::async_trait;
use profilehub_core::fingerprint::{FingerprintPolicy, FingerprintVersion, Resource};
use profilehub_core::locking::{Lock, LockSlot};
use profilehub_core::session::SessionSnapshot;
use profilehub_core::store::{DirectoryStore, LockStore, SnapshotStore, StoreError};

use crate::models::session::SessionSnapshotValues;
use crate::repositories::{
    FingerprintVersionRepo, PolicyRepo, ResourceLockRepo, ResourceRepo, SessionSnapshotRepo,
};
use crate::DbPool;

/// SQLSTATE classes worth a retry: connection exceptions (08), insufficient
/// resources (53), operator intervention such as admin shutdown (57), and
/// serialization failure / deadlock (40001, 40P01).
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || code.starts_with("57")
        || code == "40001"
        || code == "40P01"
}

/// Split sqlx failures into retryable and permanent.
pub fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Transient(err.to_string())
        }
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref().is_some_and(is_transient_sqlstate) =>
        {
            StoreError::Transient(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// LockStore
// ---------------------------------------------------------------------------

#[async_trait]
impl LockStore for PgStore {
    async fn load_lock(&self, resource_id: &str) -> Result<LockSlot, StoreError> {
        let row = ResourceLockRepo::find(&self.pool, resource_id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.map(|r| r.into_slot()).unwrap_or_default())
    }

    async fn compare_and_swap_lock(
        &self,
        resource_id: &str,
        expected_version: i64,
        next: Option<Lock>,
    ) -> Result<bool, StoreError> {
        let swapped = if expected_version == 0 {
            ResourceLockRepo::insert_first(&self.pool, resource_id, next.as_ref()).await
        } else {
            ResourceLockRepo::compare_and_swap(
                &self.pool,
                resource_id,
                expected_version,
                next.as_ref(),
            )
            .await
        }
        .map_err(classify_sqlx_error)?;

        if !swapped {
            tracing::debug!(resource_id, expected_version, "Lock CAS rejected by store");
        }
        Ok(swapped)
    }
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

#[async_trait]
impl SnapshotStore for PgStore {
    async fn load_snapshot(
        &self,
        resource_id: &str,
    ) -> Result<Option<SessionSnapshot>, StoreError> {
        let row = SessionSnapshotRepo::find(&self.pool, resource_id)
            .await
            .map_err(classify_sqlx_error)?;
        row.map(|r| r.into_snapshot())
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn compare_and_swap_snapshot(&self, next: &SessionSnapshot) -> Result<bool, StoreError> {
        let values = SessionSnapshotValues::from_snapshot(next)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        SessionSnapshotRepo::compare_and_swap(
            &self.pool,
            &next.resource_id,
            &values,
            &next.content_hash,
            next.updated_at,
        )
        .await
        .map_err(classify_sqlx_error)
    }
}

// ---------------------------------------------------------------------------
// DirectoryStore
// ---------------------------------------------------------------------------

#[async_trait]
impl DirectoryStore for PgStore {
    async fn get_resource(&self, resource_id: &str) -> Result<Option<Resource>, StoreError> {
        ResourceRepo::find_by_id(&self.pool, resource_id)
            .await
            .map(|row| row.map(Resource::from))
            .map_err(classify_sqlx_error)
    }

    async fn list_team_resources(&self, team_id: &str) -> Result<Vec<Resource>, StoreError> {
        ResourceRepo::list_by_team(&self.pool, team_id)
            .await
            .map(|rows| rows.into_iter().map(Resource::from).collect())
            .map_err(classify_sqlx_error)
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Option<FingerprintPolicy>, StoreError> {
        PolicyRepo::find_by_id(&self.pool, policy_id)
            .await
            .map(|row| row.map(FingerprintPolicy::from))
            .map_err(classify_sqlx_error)
    }

    async fn put_policy(&self, policy: &FingerprintPolicy) -> Result<(), StoreError> {
        PolicyRepo::upsert(&self.pool, policy)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn fingerprint_versions(
        &self,
        resource_id: &str,
    ) -> Result<Vec<FingerprintVersion>, StoreError> {
        FingerprintVersionRepo::list_by_resource(&self.pool, resource_id)
            .await
            .map(|rows| rows.into_iter().map(FingerprintVersion::from).collect())
            .map_err(classify_sqlx_error)
    }
}
