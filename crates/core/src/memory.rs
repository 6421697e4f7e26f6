//! In-process implementation of every store trait.
//!
//! Used for single-instance deployments (`STORE_BACKEND=memory`) and by the
//! test suites. Compare-and-swap is exact: each map is guarded by one mutex
//! and no lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Deserialize;

use crate::fingerprint::{FingerprintPolicy, FingerprintVersion, Resource};
use crate::health::ProxyHealth;
use crate::locking::{Lock, LockSlot};
use crate::session::SessionSnapshot;
use crate::store::{DirectoryStore, LockStore, ProxyHealthSource, SnapshotStore, StoreError};

/// Directory contents loaded into an [`InMemoryStore`] at startup.
///
/// The memory backend has no upstream directory, so resources, their
/// fingerprint history and team policies come from this document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySeed {
    pub resources: Vec<Resource>,
    pub fingerprint_versions: Vec<FingerprintVersion>,
    pub policies: Vec<FingerprintPolicy>,
}

impl DirectorySeed {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    locks: Mutex<HashMap<String, LockSlot>>,
    snapshots: Mutex<HashMap<String, SessionSnapshot>>,
    resources: Mutex<HashMap<String, Resource>>,
    policies: Mutex<HashMap<String, FingerprintPolicy>>,
    fingerprints: Mutex<HashMap<String, Vec<FingerprintVersion>>>,
    proxies: Mutex<HashMap<String, ProxyHealth>>,
}

/// A poisoned mutex only means another test thread panicked; the map itself
/// is still consistent because every critical section is a single insert.
fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_resource(&self, resource: Resource) {
        guard(&self.resources).insert(resource.id.clone(), resource);
    }

    pub fn insert_fingerprint_version(&self, version: FingerprintVersion) {
        let mut map = guard(&self.fingerprints);
        let list = map.entry(version.resource_id.clone()).or_default();
        if version.is_latest {
            for v in list.iter_mut() {
                v.is_latest = false;
            }
        }
        list.retain(|v| v.version != version.version);
        list.push(version);
        list.sort_by_key(|v| v.version);
    }

    /// Load every entry of `seed`. Existing entries with the same ids are
    /// replaced. Policies are validated the same way the policy endpoint does.
    pub fn seed(&self, seed: DirectorySeed) -> Result<(), crate::error::CoreError> {
        let policies = seed
            .policies
            .into_iter()
            .map(FingerprintPolicy::validated)
            .collect::<Result<Vec<_>, _>>()?;
        for resource in seed.resources {
            self.insert_resource(resource);
        }
        for version in seed.fingerprint_versions {
            self.insert_fingerprint_version(version);
        }
        let mut map = guard(&self.policies);
        for policy in policies {
            map.insert(policy.id.clone(), policy);
        }
        Ok(())
    }

    pub fn set_proxy_health(&self, team_id: &str, health: ProxyHealth) {
        guard(&self.proxies).insert(team_id.to_string(), health);
    }
}

#[async_trait]
impl LockStore for InMemoryStore {
    async fn load_lock(&self, resource_id: &str) -> Result<LockSlot, StoreError> {
        Ok(guard(&self.locks)
            .get(resource_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn compare_and_swap_lock(
        &self,
        resource_id: &str,
        expected_version: i64,
        next: Option<Lock>,
    ) -> Result<bool, StoreError> {
        let mut locks = guard(&self.locks);
        let slot = locks.entry(resource_id.to_string()).or_default();
        if slot.version != expected_version {
            return Ok(false);
        }
        slot.lock = next;
        slot.version += 1;
        Ok(true)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load_snapshot(
        &self,
        resource_id: &str,
    ) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(guard(&self.snapshots).get(resource_id).cloned())
    }

    async fn compare_and_swap_snapshot(&self, next: &SessionSnapshot) -> Result<bool, StoreError> {
        let mut snapshots = guard(&self.snapshots);
        let stored_version = snapshots
            .get(&next.resource_id)
            .map(|s| s.version)
            .unwrap_or(0);
        if stored_version + 1 != next.version {
            return Ok(false);
        }
        snapshots.insert(next.resource_id.clone(), next.clone());
        Ok(true)
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn get_resource(&self, resource_id: &str) -> Result<Option<Resource>, StoreError> {
        Ok(guard(&self.resources).get(resource_id).cloned())
    }

    async fn list_team_resources(&self, team_id: &str) -> Result<Vec<Resource>, StoreError> {
        let mut list: Vec<Resource> = guard(&self.resources)
            .values()
            .filter(|r| r.team_id == team_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Option<FingerprintPolicy>, StoreError> {
        Ok(guard(&self.policies).get(policy_id).cloned())
    }

    async fn put_policy(&self, policy: &FingerprintPolicy) -> Result<(), StoreError> {
        guard(&self.policies).insert(policy.id.clone(), policy.clone());
        Ok(())
    }

    async fn fingerprint_versions(
        &self,
        resource_id: &str,
    ) -> Result<Vec<FingerprintVersion>, StoreError> {
        Ok(guard(&self.fingerprints)
            .get(resource_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProxyHealthSource for InMemoryStore {
    async fn proxy_health(&self, team_id: &str) -> Result<ProxyHealth, StoreError> {
        Ok(guard(&self.proxies)
            .get(team_id)
            .copied()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
