//! Handlers for exclusive resource locks.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use profilehub_core::locking::{AcquireOutcome, Lock};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, OptionalJson};
use crate::handlers::team_resource;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct AcquireLockRequest {
    /// Falls back to the configured default TTL.
    #[serde(default)]
    pub ttl_secs: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtendLockRequest {
    #[serde(default)]
    pub ttl_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TakeoverRequest {
    pub justification: String,
    #[serde(default)]
    pub ttl_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LockStatus {
    pub resource_id: String,
    pub locked: bool,
    pub lock: Option<Lock>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/locks/{resource_id}/acquire
///
/// Takes the lock, or renews it if the caller already holds it. A live lock
/// held by someone else is a 409 naming the holder. The body is optional.
pub async fn acquire_lock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    OptionalJson(body): OptionalJson<AcquireLockRequest>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let outcome = state
        .services
        .locks
        .acquire(&resource_id, &user.user_id, body.ttl_secs, body.reason)
        .await?;

    if let AcquireOutcome::Conflict { conflict } = outcome {
        return Err(AppError::LockConflict(conflict));
    }
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/locks/{resource_id}/release
pub async fn release_lock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let outcome = state
        .services
        .locks
        .release(&resource_id, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/locks/{resource_id}/extend
///
/// The body is optional; without it the default TTL applies.
pub async fn extend_lock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    OptionalJson(body): OptionalJson<ExtendLockRequest>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let outcome = state
        .services
        .locks
        .extend(&resource_id, &user.user_id, body.ttl_secs)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/locks/{resource_id}/takeover
///
/// Revokes any current lock and grants a fresh one to the caller. The
/// justification is required and is forwarded to the prior holder.
pub async fn force_takeover(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    AppJson(body): AppJson<TakeoverRequest>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let outcome = state
        .services
        .locks
        .force_takeover(&resource_id, &user.user_id, &body.justification, body.ttl_secs)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/locks/{resource_id}
pub async fn lock_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let lock = state.services.locks.status(&resource_id).await?;
    Ok(Json(DataResponse {
        data: LockStatus {
            resource_id,
            locked: lock.is_some(),
            lock,
        },
    }))
}
