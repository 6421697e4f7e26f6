//! Team health scoring.
//!
//! Pure logic: the caller gathers profile, proxy, sync and API-latency
//! signals and [`compute_health`] folds them into one 0-100 score. Identical
//! inputs always produce the identical report.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Component weights. They sum to 1.0.
pub const WEIGHT_PROFILES: f64 = 0.35;
pub const WEIGHT_PROXIES: f64 = 0.30;
pub const WEIGHT_SYNC: f64 = 0.20;
pub const WEIGHT_API: f64 = 0.15;

/// Score at or above which a team is healthy.
pub const HEALTHY_THRESHOLD: u8 = 90;

/// Score at or above which a team is in warning (below is critical).
pub const WARNING_THRESHOLD: u8 = 70;

/// Upper bounds (exclusive, milliseconds) of the API latency buckets.
pub const API_FAST_MS: u64 = 200;
pub const API_MODERATE_MS: u64 = 500;
pub const API_SLOW_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Proxy status as reported by the external proxy-health collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHealth {
    pub working_count: u32,
    pub failed_count: u32,
    pub average_latency_ms: u32,
}

impl ProxyHealth {
    /// Share of reachable proxies. A team with no proxies counts as fully
    /// reachable.
    pub fn reachable_fraction(&self) -> f64 {
        let total = u64::from(self.working_count) + u64::from(self.failed_count);
        if total == 0 {
            return 1.0;
        }
        self.working_count as f64 / total as f64
    }
}

/// Aggregate session-sync state of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Syncing,
    Error,
}

impl SyncStatus {
    fn score(&self) -> f64 {
        match self {
            Self::Synced => 100.0,
            Self::Syncing => 70.0,
            Self::Error => 0.0,
        }
    }
}

/// Latency bucket of the API as observed by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiLatencyBucket {
    Fast,
    Moderate,
    Slow,
    Unresponsive,
}

impl ApiLatencyBucket {
    pub fn from_millis(ms: u64) -> Self {
        if ms < API_FAST_MS {
            Self::Fast
        } else if ms < API_MODERATE_MS {
            Self::Moderate
        } else if ms < API_SLOW_MS {
            Self::Slow
        } else {
            Self::Unresponsive
        }
    }

    fn score(&self) -> f64 {
        match self {
            Self::Fast => 100.0,
            Self::Moderate => 75.0,
            Self::Slow => 40.0,
            Self::Unresponsive => 0.0,
        }
    }
}

/// Everything the health score depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthInputs {
    pub profiles_total: u32,
    pub profiles_healthy: u32,
    pub proxy: ProxyHealth,
    pub sync_status: SyncStatus,
    pub api_latency_ms: u64,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= HEALTHY_THRESHOLD {
            Self::Healthy
        } else if score >= WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// One weighted component of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthComponent {
    /// Component score, 0-100.
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthBreakdown {
    pub profiles: HealthComponent,
    pub proxies: HealthComponent,
    pub sync: HealthComponent,
    pub api: HealthComponent,
    pub sync_status: SyncStatus,
    pub api_latency_bucket: ApiLatencyBucket,
    pub proxy_average_latency_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub score: u8,
    pub breakdown: HealthBreakdown,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Share of healthy profiles. No profiles counts as fully healthy.
pub fn profile_fraction(total: u32, healthy: u32) -> f64 {
    if total == 0 {
        return 1.0;
    }
    f64::from(healthy.min(total)) / f64::from(total)
}

/// Fold the inputs into a weighted 0-100 score and a status.
pub fn compute_health(inputs: &HealthInputs) -> HealthReport {
    let api_latency_bucket = ApiLatencyBucket::from_millis(inputs.api_latency_ms);

    let breakdown = HealthBreakdown {
        profiles: HealthComponent {
            score: profile_fraction(inputs.profiles_total, inputs.profiles_healthy) * 100.0,
            weight: WEIGHT_PROFILES,
        },
        proxies: HealthComponent {
            score: inputs.proxy.reachable_fraction() * 100.0,
            weight: WEIGHT_PROXIES,
        },
        sync: HealthComponent {
            score: inputs.sync_status.score(),
            weight: WEIGHT_SYNC,
        },
        api: HealthComponent {
            score: api_latency_bucket.score(),
            weight: WEIGHT_API,
        },
        sync_status: inputs.sync_status,
        api_latency_bucket,
        proxy_average_latency_ms: inputs.proxy.average_latency_ms,
    };

    let weighted = [
        &breakdown.profiles,
        &breakdown.proxies,
        &breakdown.sync,
        &breakdown.api,
    ]
    .iter()
    .map(|c| c.score * c.weight)
    .sum::<f64>();

    let score = weighted.round().clamp(0.0, 100.0) as u8;

    HealthReport {
        status: HealthStatus::from_score(score),
        score,
        breakdown,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> HealthInputs {
        HealthInputs {
            profiles_total: 10,
            profiles_healthy: 10,
            proxy: ProxyHealth {
                working_count: 20,
                failed_count: 0,
                average_latency_ms: 120,
            },
            sync_status: SyncStatus::Synced,
            api_latency_ms: 80,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = WEIGHT_PROFILES + WEIGHT_PROXIES + WEIGHT_SYNC + WEIGHT_API;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_green_scores_100_and_is_healthy() {
        let report = compute_health(&inputs());
        assert_eq!(report.score, 100);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn identical_inputs_give_identical_reports() {
        let a = compute_health(&inputs());
        let b = compute_health(&inputs());
        assert_eq!(a, b);
    }

    #[test]
    fn half_failed_proxies_drop_to_warning() {
        let mut i = inputs();
        i.proxy.failed_count = 20;
        // 35 + 15 + 20 + 15 = 85
        let report = compute_health(&i);
        assert_eq!(report.score, 85);
        assert_eq!(report.status, HealthStatus::Warning);
    }

    #[test]
    fn sync_error_and_unhealthy_profiles_are_critical() {
        let mut i = inputs();
        i.profiles_healthy = 5;
        i.sync_status = SyncStatus::Error;
        // 17.5 + 30 + 0 + 15 = 62.5 -> 63
        let report = compute_health(&i);
        assert_eq!(report.score, 63);
        assert_eq!(report.status, HealthStatus::Critical);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(HealthStatus::from_score(90), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(89), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_score(69), HealthStatus::Critical);
    }

    #[test]
    fn latency_buckets() {
        assert_eq!(ApiLatencyBucket::from_millis(0), ApiLatencyBucket::Fast);
        assert_eq!(ApiLatencyBucket::from_millis(200), ApiLatencyBucket::Moderate);
        assert_eq!(ApiLatencyBucket::from_millis(999), ApiLatencyBucket::Slow);
        assert_eq!(
            ApiLatencyBucket::from_millis(1_000),
            ApiLatencyBucket::Unresponsive
        );
    }

    #[test]
    fn empty_team_counts_as_fully_healthy() {
        assert_eq!(profile_fraction(0, 0), 1.0);
        assert_eq!(ProxyHealth::default().reachable_fraction(), 1.0);
    }

    #[test]
    fn proxy_health_reads_camel_case() {
        let json = r#"{"workingCount":3,"failedCount":1,"averageLatencyMs":250}"#;
        let proxy: ProxyHealth = serde_json::from_str(json).unwrap();
        assert_eq!(proxy.working_count, 3);
        assert!((proxy.reachable_fraction() - 0.75).abs() < 1e-9);
    }
}
