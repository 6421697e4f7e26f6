//! Handlers for collaborator presence.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use profilehub_core::presence::PresenceStatus;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::handlers::team_resource;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn default_status() -> PresenceStatus {
    PresenceStatus::Online
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default = "default_status")]
    pub status: PresenceStatus,
    /// Resource the caller is currently working in, if any.
    #[serde(default)]
    pub current_resource: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub was_online: bool,
}

/// POST /api/v1/presence/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(body): AppJson<HeartbeatRequest>,
) -> AppResult<impl IntoResponse> {
    if let Some(resource_id) = &body.current_resource {
        team_resource(&state, &user, resource_id).await?;
    }

    let record = state
        .services
        .presence
        .heartbeat(&user.user_id, &user.team_id, body.status, body.current_resource)
        .await;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/presence
///
/// Collaborators of the caller's team seen within the presence window.
pub async fn list_online(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let online = state.services.presence.list_online(&user.team_id).await;
    Ok(Json(DataResponse { data: online }))
}

/// POST /api/v1/presence/leave
pub async fn leave(State(state): State<AppState>, user: AuthUser) -> AppResult<impl IntoResponse> {
    let was_online = state.services.presence.leave(&user.user_id).await;
    Ok(Json(DataResponse {
        data: LeaveResponse { was_online },
    }))
}
