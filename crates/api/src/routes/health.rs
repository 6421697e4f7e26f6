use axum::routing::get;
use axum::Router;

use crate::handlers::health;
use crate::state::AppState;

/// Mount the liveness check (intended for root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health::liveness))
}

/// Team health routes, nested under `/api/v1/health`.
///
/// ```text
/// GET /teams/{team_id}    weighted health report
/// ```
pub fn api_router() -> Router<AppState> {
    Router::new().route("/teams/{team_id}", get(health::team_health))
}
