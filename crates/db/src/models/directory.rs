//! Resource, fingerprint policy and fingerprint version row models.

use profilehub_core::fingerprint::{FingerprintPolicy, FingerprintVersion, Resource};
use profilehub_core::types::Timestamp;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// A row from the `resources` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: String,
    pub team_id: String,
    pub tags: Vec<String>,
    pub browser: String,
    pub os: String,
    pub fingerprint_version: i64,
    pub policy_id: Option<String>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: row.id,
            team_id: row.team_id,
            tags: row.tags,
            browser: row.browser,
            os: row.os,
            fingerprint_version: row.fingerprint_version,
            policy_id: row.policy_id,
        }
    }
}

// ---------------------------------------------------------------------------
// FingerprintPolicy
// ---------------------------------------------------------------------------

/// A row from the `fingerprint_policies` table.
#[derive(Debug, Clone, FromRow)]
pub struct FingerprintPolicyRow {
    pub id: String,
    pub team_id: String,
    pub max_versions_behind_desktop: i64,
    pub max_versions_behind_mobile: i64,
    pub allowed_browsers: Vec<String>,
    pub auto_upgrade: bool,
}

impl From<FingerprintPolicyRow> for FingerprintPolicy {
    fn from(row: FingerprintPolicyRow) -> Self {
        Self {
            id: row.id,
            team_id: row.team_id,
            max_versions_behind_desktop: row.max_versions_behind_desktop,
            max_versions_behind_mobile: row.max_versions_behind_mobile,
            allowed_browsers: row.allowed_browsers.into_iter().collect(),
            auto_upgrade: row.auto_upgrade,
        }
    }
}

// ---------------------------------------------------------------------------
// FingerprintVersion
// ---------------------------------------------------------------------------

/// A row from the `fingerprint_versions` table.
#[derive(Debug, Clone, FromRow)]
pub struct FingerprintVersionRow {
    pub resource_id: String,
    pub version: i64,
    pub browser_version: String,
    pub created_at: Timestamp,
    pub is_latest: bool,
}

impl From<FingerprintVersionRow> for FingerprintVersion {
    fn from(row: FingerprintVersionRow) -> Self {
        Self {
            resource_id: row.resource_id,
            version: row.version,
            browser_version: row.browser_version,
            created_at: row.created_at,
            is_latest: row.is_latest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_row_dedupes_browsers() {
        let row = FingerprintPolicyRow {
            id: "pol".into(),
            team_id: "t1".into(),
            max_versions_behind_desktop: 2,
            max_versions_behind_mobile: 3,
            allowed_browsers: vec!["chrome".into(), "firefox".into(), "chrome".into()],
            auto_upgrade: true,
        };
        let policy = FingerprintPolicy::from(row);
        assert_eq!(policy.allowed_browsers.len(), 2);
        assert!(policy.allows_browser("Firefox"));
    }
}
