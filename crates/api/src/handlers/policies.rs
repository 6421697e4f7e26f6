//! Handlers for fingerprint policies and on-demand evaluation.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use profilehub_core::error::CoreError;
use profilehub_core::fingerprint::FingerprintPolicy;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::handlers::team_resource;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Policy fields a team admin may set. Id and team come from the path and
/// the caller's token.
#[derive(Debug, Deserialize)]
pub struct PolicyInput {
    pub max_versions_behind_desktop: i64,
    pub max_versions_behind_mobile: i64,
    /// Empty allows any browser.
    #[serde(default)]
    pub allowed_browsers: BTreeSet<String>,
    #[serde(default)]
    pub auto_upgrade: bool,
}

/// Fetch a policy and check it belongs to the caller's team.
async fn team_policy(
    state: &AppState,
    user: &AuthUser,
    policy_id: &str,
) -> AppResult<FingerprintPolicy> {
    let policy = state.services.policies.get_policy(policy_id).await?;
    user.require_team(&policy.team_id)?;
    Ok(policy)
}

/// PUT /api/v1/policies/{policy_id}
///
/// Creates or replaces a policy owned by the caller's team.
pub async fn put_policy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(policy_id): Path<String>,
    AppJson(input): AppJson<PolicyInput>,
) -> AppResult<impl IntoResponse> {
    match state.services.policies.get_policy(&policy_id).await {
        Ok(existing) => user.require_team(&existing.team_id)?,
        Err(CoreError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let policy = FingerprintPolicy {
        id: policy_id,
        team_id: user.team_id.clone(),
        max_versions_behind_desktop: input.max_versions_behind_desktop,
        max_versions_behind_mobile: input.max_versions_behind_mobile,
        allowed_browsers: input.allowed_browsers,
        auto_upgrade: input.auto_upgrade,
    };
    let stored = state.services.policies.put_policy(policy).await?;

    tracing::info!(
        policy_id = %stored.id,
        team_id = %stored.team_id,
        user_id = %user.user_id,
        "Fingerprint policy saved"
    );
    Ok(Json(DataResponse { data: stored }))
}

/// GET /api/v1/policies/{policy_id}
pub async fn get_policy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(policy_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let policy = team_policy(&state, &user, &policy_id).await?;
    Ok(Json(DataResponse { data: policy }))
}

/// POST /api/v1/policies/{policy_id}/evaluate/{resource_id}
///
/// Evaluates the resource against the policy. A violation is also
/// announced to the team.
pub async fn evaluate_policy(
    State(state): State<AppState>,
    user: AuthUser,
    Path((policy_id, resource_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    team_policy(&state, &user, &policy_id).await?;
    team_resource(&state, &user, &resource_id).await?;

    let evaluation = state
        .services
        .policies
        .evaluate(&policy_id, &resource_id)
        .await?;
    Ok(Json(DataResponse { data: evaluation }))
}
