use axum::routing::{get, post};
use axum::Router;

use crate::handlers::locks;
use crate::state::AppState;

/// Lock routes, nested under `/api/v1/locks`.
///
/// ```text
/// GET  /{resource_id}             lock_status
/// POST /{resource_id}/acquire     acquire_lock
/// POST /{resource_id}/release     release_lock
/// POST /{resource_id}/extend      extend_lock
/// POST /{resource_id}/takeover    force_takeover
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{resource_id}", get(locks::lock_status))
        .route("/{resource_id}/acquire", post(locks::acquire_lock))
        .route("/{resource_id}/release", post(locks::release_lock))
        .route("/{resource_id}/extend", post(locks::extend_lock))
        .route("/{resource_id}/takeover", post(locks::force_takeover))
}
