use axum::routing::{get, post};
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Presence routes, nested under `/api/v1/presence`.
///
/// ```text
/// GET  /             list_online
/// POST /heartbeat    heartbeat
/// POST /leave        leave
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(presence::list_online))
        .route("/heartbeat", post(presence::heartbeat))
        .route("/leave", post(presence::leave))
}
