pub mod health;
pub mod locks;
pub mod policies;
pub mod presence;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route tree:
/// ```text
/// /ws                                                   WebSocket (GET upgrade)
///
/// /locks/{resource_id}                                  lock status (GET)
/// /locks/{resource_id}/acquire                          acquire or renew (POST)
/// /locks/{resource_id}/release                          release (POST)
/// /locks/{resource_id}/extend                           extend (POST)
/// /locks/{resource_id}/takeover                         forced takeover (POST)
///
/// /presence                                             online team members (GET)
/// /presence/heartbeat                                   heartbeat (POST)
/// /presence/leave                                       sign off (POST)
///
/// /sessions/{resource_id}                               snapshot (GET)
/// /sessions/{resource_id}/merge                         merge diff (POST)
///
/// /policies/{policy_id}                                 get, put
/// /policies/{policy_id}/evaluate/{resource_id}          evaluate (POST)
///
/// /health/teams/{team_id}                               team health report (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/locks", locks::router())
        .nest("/presence", presence::router())
        .nest("/sessions", sessions::router())
        .nest("/policies", policies::router())
        .nest("/health", health::api_router())
}
