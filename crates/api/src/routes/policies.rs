use axum::routing::{get, post};
use axum::Router;

use crate::handlers::policies;
use crate::state::AppState;

/// Fingerprint policy routes, nested under `/api/v1/policies`.
///
/// ```text
/// GET  /{policy_id}                           get_policy
/// PUT  /{policy_id}                           put_policy
/// POST /{policy_id}/evaluate/{resource_id}    evaluate_policy
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{policy_id}",
            get(policies::get_policy).put(policies::put_policy),
        )
        .route(
            "/{policy_id}/evaluate/{resource_id}",
            post(policies::evaluate_policy),
        )
}
