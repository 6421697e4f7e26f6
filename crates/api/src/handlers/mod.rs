//! HTTP handlers, one module per coordination service.

pub mod health;
pub mod locks;
pub mod policies;
pub mod presence;
pub mod sessions;

use profilehub_core::fingerprint::Resource;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Load a resource and check that it belongs to the caller's team.
///
/// Missing resources are 404, resources of another team are 403.
pub(crate) async fn team_resource(
    state: &AppState,
    user: &AuthUser,
    resource_id: &str,
) -> AppResult<Resource> {
    let resource = state.services.policies.get_resource(resource_id).await?;
    user.require_team(&resource.team_id)?;
    Ok(resource)
}
