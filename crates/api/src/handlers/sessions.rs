//! Handlers for session snapshot reads and diff merges.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use profilehub_core::session::{DiffEntry, DiffOp, EntryKind, SessionDiff, SessionSnapshot};
use profilehub_core::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::handlers::team_resource;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One client edit. The author is always the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct DiffEntryInput {
    pub kind: EntryKind,
    pub domain: String,
    pub key: String,
    pub op: DiffOp,
    pub modified_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    /// Snapshot version the client last saw.
    pub base_version: u64,
    pub entries: Vec<DiffEntryInput>,
}

impl MergeRequest {
    fn into_diff(self, author: &str) -> SessionDiff {
        SessionDiff {
            entries: self
                .entries
                .into_iter()
                .map(|e| DiffEntry {
                    kind: e.kind,
                    domain: e.domain,
                    key: e.key,
                    op: e.op,
                    modified_at: e.modified_at,
                    modified_by: author.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotEntry {
    pub kind: EntryKind,
    pub domain: String,
    pub key: String,
    pub value: String,
    pub last_modified_at: Timestamp,
    pub last_modified_by: UserId,
}

/// Reader view of a snapshot: removed keys are not shown.
#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub resource_id: String,
    pub version: u64,
    pub content_hash: String,
    pub updated_at: Option<Timestamp>,
    pub entries: Vec<SnapshotEntry>,
}

impl From<SessionSnapshot> for SnapshotView {
    fn from(snapshot: SessionSnapshot) -> Self {
        let entries = snapshot
            .live_entries()
            .filter_map(|(key, entry)| {
                entry.value.as_ref().map(|value| SnapshotEntry {
                    kind: key.kind,
                    domain: key.domain.clone(),
                    key: key.key.clone(),
                    value: value.clone(),
                    last_modified_at: entry.last_modified_at,
                    last_modified_by: entry.last_modified_by.clone(),
                })
            })
            .collect();
        Self {
            resource_id: snapshot.resource_id,
            version: snapshot.version,
            content_hash: snapshot.content_hash,
            updated_at: snapshot.updated_at,
            entries,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/sessions/{resource_id}
pub async fn get_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    team_resource(&state, &user, &resource_id).await?;

    let snapshot = state.services.sessions.get_snapshot(&resource_id).await?;
    Ok(Json(DataResponse {
        data: SnapshotView::from(snapshot),
    }))
}

/// POST /api/v1/sessions/{resource_id}/merge
///
/// Returns `merged` with the new version and merge report, or `conflict`
/// when `base_version` is ahead of the stored snapshot.
pub async fn merge_diff(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    AppJson(body): AppJson<MergeRequest>,
) -> AppResult<impl IntoResponse> {
    let resource = team_resource(&state, &user, &resource_id).await?;

    let base_version = body.base_version;
    let diff = body.into_diff(&user.user_id);
    let outcome = state
        .services
        .sessions
        .merge_and_persist(&resource.team_id, &resource_id, &diff, base_version)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}
