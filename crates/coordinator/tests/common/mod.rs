//! Shared harness for coordinator integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use profilehub_coordinator::{Backends, CoordinationServices, CoordinatorConfig};
use profilehub_core::clock::ManualClock;
use profilehub_core::fingerprint::{FingerprintPolicy, FingerprintVersion, Resource};
use profilehub_core::memory::InMemoryStore;
use profilehub_core::types::Timestamp;
use profilehub_events::{EventBus, PlatformEvent};
use tokio::sync::broadcast;

pub struct Harness {
    pub services: CoordinationServices,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub events: broadcast::Receiver<PlatformEvent>,
}

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        store_retry_backoff: Duration::from_millis(1),
        ..CoordinatorConfig::default()
    }
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    harness_with(Backends::in_memory(store.clone()), store)
}

/// Build services over custom backends. `store` is still returned for
/// seeding whatever seams it serves.
pub fn harness_with(backends: Backends, store: Arc<InMemoryStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let bus = Arc::new(EventBus::default());
    let events = bus.subscribe();
    let services = CoordinationServices::new(backends, bus, clock.clone(), &test_config());
    Harness {
        services,
        store,
        clock,
        events,
    }
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<PlatformEvent>) -> Vec<PlatformEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn resource(id: &str, browser: &str, os: &str, version: i64, policy: Option<&str>) -> Resource {
    Resource {
        id: id.into(),
        team_id: "team-1".into(),
        tags: Vec::new(),
        browser: browser.into(),
        os: os.into(),
        fingerprint_version: version,
        policy_id: policy.map(str::to_string),
    }
}

/// Seed versions `1..=latest` for a resource, flagging the last as latest.
pub fn seed_versions(store: &InMemoryStore, resource_id: &str, latest: i64) {
    for v in 1..=latest {
        store.insert_fingerprint_version(FingerprintVersion {
            resource_id: resource_id.into(),
            version: v,
            browser_version: format!("12{v}.0"),
            created_at: t0(),
            is_latest: v == latest,
        });
    }
}

pub fn policy(id: &str, desktop: i64, mobile: i64, browsers: &[&str]) -> FingerprintPolicy {
    FingerprintPolicy {
        id: id.into(),
        team_id: "team-1".into(),
        max_versions_behind_desktop: desktop,
        max_versions_behind_mobile: mobile,
        allowed_browsers: browsers.iter().map(|b| b.to_string()).collect(),
        auto_upgrade: false,
    }
}
