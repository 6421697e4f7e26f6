use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Session sync routes, nested under `/api/v1/sessions`.
///
/// ```text
/// GET  /{resource_id}          get_snapshot
/// POST /{resource_id}/merge    merge_diff
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{resource_id}", get(sessions::get_snapshot))
        .route("/{resource_id}/merge", post(sessions::merge_diff))
}
