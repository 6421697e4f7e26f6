//! Coordination services for shared browser profiles.
//!
//! Each service talks to storage only through the `profilehub-core` store
//! traits and announces state changes on the shared [`EventBus`]. Build the
//! whole set at once with [`CoordinationServices::new`].

pub mod config;
pub mod fingerprint;
pub mod health;
pub mod lock_manager;
pub mod presence;
pub mod proxy_health;
pub mod retry;
pub mod session_sync;

use std::sync::Arc;

use profilehub_core::clock::Clock;
use profilehub_core::memory::InMemoryStore;
use profilehub_core::store::{DirectoryStore, LockStore, ProxyHealthSource, SnapshotStore};
use profilehub_events::EventBus;

pub use config::CoordinatorConfig;
pub use fingerprint::FingerprintPolicyEngine;
pub use health::{HealthAggregator, LatencyGauge};
pub use lock_manager::LockManager;
pub use presence::PresenceService;
pub use session_sync::{SessionSyncCoordinator, SyncBoard};

/// The storage seams every service is built against.
#[derive(Clone)]
pub struct Backends {
    pub locks: Arc<dyn LockStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub proxies: Arc<dyn ProxyHealthSource>,
}

impl Backends {
    /// Every seam served by one in-process store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            locks: store.clone(),
            snapshots: store.clone(),
            directory: store.clone(),
            proxies: store,
        }
    }
}

/// All five services, sharing one event bus, clock and sync board.
#[derive(Clone)]
pub struct CoordinationServices {
    pub locks: Arc<LockManager>,
    pub presence: Arc<PresenceService>,
    pub sessions: Arc<SessionSyncCoordinator>,
    pub policies: Arc<FingerprintPolicyEngine>,
    pub health: Arc<HealthAggregator>,
    pub latency: Arc<LatencyGauge>,
    pub events: Arc<EventBus>,
}

impl CoordinationServices {
    pub fn new(
        backends: Backends,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: &CoordinatorConfig,
    ) -> Self {
        let board = Arc::new(SyncBoard::default());
        let latency = Arc::new(LatencyGauge::default());

        let locks = Arc::new(LockManager::new(
            backends.locks,
            events.clone(),
            clock.clone(),
            config,
        ));
        let presence = Arc::new(PresenceService::new(
            config.presence_window_secs,
            events.clone(),
            clock.clone(),
        ));
        let sessions = Arc::new(SessionSyncCoordinator::new(
            backends.snapshots,
            events.clone(),
            clock.clone(),
            board.clone(),
            config,
        ));
        let policies = Arc::new(FingerprintPolicyEngine::new(
            backends.directory.clone(),
            events.clone(),
            clock,
            config,
        ));
        let health = Arc::new(HealthAggregator::new(
            backends.directory,
            backends.proxies,
            policies.clone(),
            board,
            latency.clone(),
            config,
        ));

        Self {
            locks,
            presence,
            sessions,
            policies,
            health,
            latency,
            events,
        }
    }
}
