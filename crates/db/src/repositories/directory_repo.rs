//! Repositories for `resources`, `fingerprint_policies` and
//! `fingerprint_versions`.

use profilehub_core::fingerprint::FingerprintPolicy;
use sqlx::PgPool;

use crate::models::directory::{FingerprintPolicyRow, FingerprintVersionRow, ResourceRow};

// ---------------------------------------------------------------------------
// ResourceRepo
// ---------------------------------------------------------------------------

/// Column list for `resources` queries.
const RESOURCE_COLUMNS: &str = "id, team_id, tags, browser, os, fingerprint_version, policy_id";

pub struct ResourceRepo;

impl ResourceRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ResourceRow>, sqlx::Error> {
        let query = format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1");
        sqlx::query_as::<_, ResourceRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All resources of a team, ordered by id.
    pub async fn list_by_team(pool: &PgPool, team_id: &str) -> Result<Vec<ResourceRow>, sqlx::Error> {
        let query =
            format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE team_id = $1 ORDER BY id");
        sqlx::query_as::<_, ResourceRow>(&query)
            .bind(team_id)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// PolicyRepo
// ---------------------------------------------------------------------------

/// Column list for `fingerprint_policies` queries.
const POLICY_COLUMNS: &str = "id, team_id, max_versions_behind_desktop, \
                              max_versions_behind_mobile, allowed_browsers, auto_upgrade";

pub struct PolicyRepo;

impl PolicyRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<FingerprintPolicyRow>, sqlx::Error> {
        let query = format!("SELECT {POLICY_COLUMNS} FROM fingerprint_policies WHERE id = $1");
        sqlx::query_as::<_, FingerprintPolicyRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace a policy by id.
    pub async fn upsert(pool: &PgPool, policy: &FingerprintPolicy) -> Result<(), sqlx::Error> {
        let browsers: Vec<&str> = policy.allowed_browsers.iter().map(String::as_str).collect();
        sqlx::query(
            "INSERT INTO fingerprint_policies \
                (id, team_id, max_versions_behind_desktop, max_versions_behind_mobile, \
                 allowed_browsers, auto_upgrade) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                team_id = EXCLUDED.team_id, \
                max_versions_behind_desktop = EXCLUDED.max_versions_behind_desktop, \
                max_versions_behind_mobile = EXCLUDED.max_versions_behind_mobile, \
                allowed_browsers = EXCLUDED.allowed_browsers, \
                auto_upgrade = EXCLUDED.auto_upgrade, \
                updated_at = NOW()",
        )
        .bind(&policy.id)
        .bind(&policy.team_id)
        .bind(policy.max_versions_behind_desktop)
        .bind(policy.max_versions_behind_mobile)
        .bind(&browsers)
        .bind(policy.auto_upgrade)
        .execute(pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FingerprintVersionRepo
// ---------------------------------------------------------------------------

/// Column list for `fingerprint_versions` queries.
const VERSION_COLUMNS: &str = "resource_id, version, browser_version, created_at, is_latest";

pub struct FingerprintVersionRepo;

impl FingerprintVersionRepo {
    /// Every generation of a resource, oldest first.
    pub async fn list_by_resource(
        pool: &PgPool,
        resource_id: &str,
    ) -> Result<Vec<FingerprintVersionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM fingerprint_versions \
             WHERE resource_id = $1 ORDER BY version"
        );
        sqlx::query_as::<_, FingerprintVersionRow>(&query)
            .bind(resource_id)
            .fetch_all(pool)
            .await
    }
}
