//! Team health aggregation.
//!
//! [`HealthAggregator::compute`] only gathers inputs; the score itself comes
//! from the pure [`compute_health`], so the same inputs always give the same
//! report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use profilehub_core::error::CoreError;
use profilehub_core::fingerprint::Resource;
use profilehub_core::health::{compute_health, HealthInputs, HealthReport, ProxyHealth};
use profilehub_core::store::{DirectoryStore, ProxyHealthSource};

use crate::config::CoordinatorConfig;
use crate::fingerprint::FingerprintPolicyEngine;
use crate::retry::RetryPolicy;
use crate::session_sync::SyncBoard;

// ---------------------------------------------------------------------------
// LatencyGauge
// ---------------------------------------------------------------------------

/// Smoothing factor of the latency moving average.
const LATENCY_EWMA_ALPHA: f64 = 0.2;

/// Exponentially weighted moving average of API response times.
///
/// Fed by the HTTP layer; read once per health computation.
#[derive(Debug, Default)]
pub struct LatencyGauge {
    average_ms: Mutex<Option<f64>>,
}

impl LatencyGauge {
    pub fn record(&self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1_000.0;
        let mut avg = self.average_ms.lock().unwrap_or_else(|e| e.into_inner());
        *avg = Some(match *avg {
            None => sample,
            Some(prev) => prev + LATENCY_EWMA_ALPHA * (sample - prev),
        });
    }

    /// Current average in whole milliseconds. No samples reads as 0.
    pub fn average_ms(&self) -> u64 {
        let avg = self.average_ms.lock().unwrap_or_else(|e| e.into_inner());
        avg.map(|ms| ms.round() as u64).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// HealthAggregator
// ---------------------------------------------------------------------------

pub struct HealthAggregator {
    directory: Arc<dyn DirectoryStore>,
    proxies: Arc<dyn ProxyHealthSource>,
    policies: Arc<FingerprintPolicyEngine>,
    sync_board: Arc<SyncBoard>,
    latency: Arc<LatencyGauge>,
    retry: RetryPolicy,
}

impl HealthAggregator {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        proxies: Arc<dyn ProxyHealthSource>,
        policies: Arc<FingerprintPolicyEngine>,
        sync_board: Arc<SyncBoard>,
        latency: Arc<LatencyGauge>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            directory,
            proxies,
            policies,
            sync_board,
            latency,
            retry: RetryPolicy::new(config.store_retry_backoff),
        }
    }

    /// Gather the team's current signals and score them.
    pub async fn compute(&self, team_id: &str) -> Result<HealthReport, CoreError> {
        let inputs = self.gather(team_id).await?;
        let report = compute_health(&inputs);
        tracing::debug!(
            team_id,
            score = report.score,
            status = ?report.status,
            "Health computed"
        );
        Ok(report)
    }

    /// Snapshot of everything the score depends on.
    pub async fn gather(&self, team_id: &str) -> Result<HealthInputs, CoreError> {
        let directory = &self.directory;
        let resources = self
            .retry
            .run("list_team_resources", move || {
                directory.list_team_resources(team_id)
            })
            .await?;

        let mut profiles_healthy = 0u32;
        for resource in &resources {
            if self.is_profile_healthy(resource).await? {
                profiles_healthy += 1;
            }
        }

        let proxy = self.proxy_health(team_id).await?;
        let sync_status = self
            .sync_board
            .aggregate(resources.iter().map(|r| r.id.as_str()));

        Ok(HealthInputs {
            profiles_total: u32::try_from(resources.len()).unwrap_or(u32::MAX),
            profiles_healthy,
            proxy,
            sync_status,
            api_latency_ms: self.latency.average_ms(),
        })
    }

    /// A profile without a policy is healthy. One whose policy or
    /// fingerprint history is missing is not.
    async fn is_profile_healthy(&self, resource: &Resource) -> Result<bool, CoreError> {
        let Some(policy_id) = &resource.policy_id else {
            return Ok(true);
        };
        let policy = match self.policies.get_policy(policy_id).await {
            Ok(policy) => policy,
            Err(CoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        match self.policies.evaluate_resource(&policy, resource).await {
            Ok(evaluation) => Ok(evaluation.is_compliant()),
            Err(CoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn proxy_health(&self, team_id: &str) -> Result<ProxyHealth, CoreError> {
        let proxies = &self.proxies;
        self.retry
            .run("proxy_health", move || proxies.proxy_health(team_id))
            .await
    }
}
