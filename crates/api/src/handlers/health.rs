//! Handlers for service liveness and team health.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Liveness payload.
#[derive(Serialize)]
pub struct LivenessResponse {
    /// `ok`, or `degraded` when the database does not answer.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `memory` or `postgres`.
    pub store: &'static str,
    /// Whether the database is reachable. Absent with the memory store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_healthy: Option<bool>,
}

/// GET /health -- service liveness (not under `/api/v1`).
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    let db_healthy = match &state.pool {
        Some(pool) => Some(profilehub_db::health_check(pool).await.is_ok()),
        None => None,
    };

    let status = if db_healthy == Some(false) {
        "degraded"
    } else {
        "ok"
    };

    Json(LivenessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store: state.backend.as_str(),
        db_healthy,
    })
}

/// GET /api/v1/health/teams/{team_id}
///
/// Recomputes the weighted health report of the caller's team.
pub async fn team_health(
    State(state): State<AppState>,
    user: AuthUser,
    Path(team_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require_team(&team_id)?;

    let report = state.services.health.compute(&team_id).await?;
    tracing::debug!(
        team_id = %team_id,
        score = report.score,
        status = ?report.status,
        "Team health computed"
    );
    Ok(Json(DataResponse { data: report }))
}
