//! Backing-store seams.
//!
//! The lock slot and the session snapshot are the only shared mutable state.
//! Both are written with a versioned compare-and-swap so that any number of
//! server instances can share one store without an in-process mutex.

use async_trait::async_trait;

use crate::fingerprint::{FingerprintPolicy, FingerprintVersion, Resource};
use crate::health::ProxyHealth;
use crate::locking::{Lock, LockSlot};
use crate::session::SessionSnapshot;

/// Failure talking to a backing store or collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Temporarily unavailable (timeouts, dropped connections, pool
    /// exhaustion). Worth one retry.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Anything else: corrupt data, constraint violations, bugs.
    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Per-resource lock slots with compare-and-swap writes.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Read the slot. A resource that was never locked reads as
    /// `LockSlot { lock: None, version: 0 }`.
    async fn load_lock(&self, resource_id: &str) -> Result<LockSlot, StoreError>;

    /// Replace the slot's lock with `next` only if its version is still
    /// `expected_version`. Returns `false` when another writer won.
    async fn compare_and_swap_lock(
        &self,
        resource_id: &str,
        expected_version: i64,
        next: Option<Lock>,
    ) -> Result<bool, StoreError>;
}

/// Durable session snapshots with compare-and-swap writes.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_snapshot(&self, resource_id: &str)
        -> Result<Option<SessionSnapshot>, StoreError>;

    /// Persist `next` only if the stored version equals `next.version - 1`
    /// (or no snapshot exists and `next.version == 1`).
    async fn compare_and_swap_snapshot(&self, next: &SessionSnapshot) -> Result<bool, StoreError>;
}

/// Keyed lookups against the resource/team/policy store.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_resource(&self, resource_id: &str) -> Result<Option<Resource>, StoreError>;

    async fn list_team_resources(&self, team_id: &str) -> Result<Vec<Resource>, StoreError>;

    async fn get_policy(&self, policy_id: &str) -> Result<Option<FingerprintPolicy>, StoreError>;

    async fn put_policy(&self, policy: &FingerprintPolicy) -> Result<(), StoreError>;

    /// All fingerprint generations known for a resource.
    async fn fingerprint_versions(
        &self,
        resource_id: &str,
    ) -> Result<Vec<FingerprintVersion>, StoreError>;
}

/// The external proxy-health collaborator.
#[async_trait]
pub trait ProxyHealthSource: Send + Sync {
    async fn proxy_health(&self, team_id: &str) -> Result<ProxyHealth, StoreError>;
}
