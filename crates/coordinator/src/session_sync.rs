//! Durable session snapshots with per-key merging.
//!
//! A merge reads the stored snapshot, folds the diff in with
//! [`merge_diff`], and writes the result back with a compare-and-swap on
//! `version`. Losing the swap means another instance merged first; the diff
//! is simply re-merged on top of the newer snapshot, which is safe because
//! the per-key rule is commutative.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use profilehub_core::clock::Clock;
use profilehub_core::error::CoreError;
use profilehub_core::health::SyncStatus;
use profilehub_core::session::{
    check_base_version, merge_diff, MergeOutcome, MergeReport, MergeResult, SessionDiff,
    SessionSnapshot,
};
use profilehub_core::store::{SnapshotStore, StoreError};
use profilehub_core::types::ResourceId;
use profilehub_events::{event_types, EventBus, PlatformEvent};

use crate::config::CoordinatorConfig;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// SyncBoard
// ---------------------------------------------------------------------------

/// Last observed sync state per resource, as seen by this instance.
///
/// Feeds the sync component of the team health score. A resource that was
/// never merged here counts as synced.
#[derive(Debug, Default)]
pub struct SyncBoard {
    states: Mutex<HashMap<ResourceId, SyncStatus>>,
}

impl SyncBoard {
    pub fn mark(&self, resource_id: &str, status: SyncStatus) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(resource_id.to_string(), status);
    }

    pub fn status_of(&self, resource_id: &str) -> SyncStatus {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(resource_id)
            .copied()
            .unwrap_or(SyncStatus::Synced)
    }

    /// Worst state across `resource_ids`: any error wins, then any
    /// in-flight merge.
    pub fn aggregate<'a>(&self, resource_ids: impl IntoIterator<Item = &'a str>) -> SyncStatus {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let mut overall = SyncStatus::Synced;
        for id in resource_ids {
            match states.get(id) {
                Some(SyncStatus::Error) => return SyncStatus::Error,
                Some(SyncStatus::Syncing) => overall = SyncStatus::Syncing,
                _ => {}
            }
        }
        overall
    }
}

// ---------------------------------------------------------------------------
// SessionSyncCoordinator
// ---------------------------------------------------------------------------

pub struct SessionSyncCoordinator {
    store: Arc<dyn SnapshotStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    board: Arc<SyncBoard>,
    retry: RetryPolicy,
    cas_attempts: u32,
}

impl SessionSyncCoordinator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        board: Arc<SyncBoard>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            board,
            retry: RetryPolicy::new(config.store_retry_backoff),
            cas_attempts: config.merge_cas_attempts.max(1),
        }
    }

    pub fn board(&self) -> &Arc<SyncBoard> {
        &self.board
    }

    /// Current snapshot. A resource that was never merged reads as version
    /// 0 with the hash of the empty map.
    pub async fn get_snapshot(&self, resource_id: &str) -> Result<SessionSnapshot, CoreError> {
        Ok(self
            .load(resource_id)
            .await?
            .unwrap_or_else(|| SessionSnapshot::empty(resource_id)))
    }

    /// Merge `diff` into the snapshot of `resource_id` and persist it.
    ///
    /// `base_version` is the snapshot version the client last saw. A base
    /// newer than the stored version is a [`MergeOutcome::Conflict`]; an
    /// older base is fine since each key carries its own timestamp.
    /// `team_id` scopes the `sync.conflict` audit event.
    pub async fn merge_and_persist(
        &self,
        team_id: &str,
        resource_id: &str,
        diff: &SessionDiff,
        base_version: u64,
    ) -> Result<MergeOutcome, CoreError> {
        diff.validate()?;

        self.board.mark(resource_id, SyncStatus::Syncing);
        let result = self
            .merge_with_retries(team_id, resource_id, diff, base_version)
            .await;
        match &result {
            Ok(MergeOutcome::Merged(_)) => self.board.mark(resource_id, SyncStatus::Synced),
            // A rejected base leaves the stored state as it was.
            Ok(MergeOutcome::Conflict { .. }) => {
                self.board.mark(resource_id, SyncStatus::Synced)
            }
            Err(_) => self.board.mark(resource_id, SyncStatus::Error),
        }
        result
    }

    async fn merge_with_retries(
        &self,
        team_id: &str,
        resource_id: &str,
        diff: &SessionDiff,
        base_version: u64,
    ) -> Result<MergeOutcome, CoreError> {
        for attempt in 1..=self.cas_attempts {
            let current = self.get_snapshot(resource_id).await?;

            if let Err((current_version, base_version)) =
                check_base_version(current.version, base_version)
            {
                tracing::info!(
                    resource_id,
                    current_version,
                    base_version,
                    "Merge rejected: base version ahead of store"
                );
                return Ok(MergeOutcome::Conflict {
                    current_version,
                    base_version,
                });
            }

            let now = self.clock.now();
            let (next, report) = merge_diff(&current, diff, now);

            if !self.swap(&next).await? {
                tracing::debug!(
                    resource_id,
                    attempt,
                    version = next.version,
                    "Snapshot CAS lost, re-merging"
                );
                continue;
            }

            tracing::info!(
                resource_id,
                version = next.version,
                applied = report.applied.len(),
                duplicates = report.duplicates.len(),
                lost = report.lost_updates.len(),
                "Session merged"
            );
            if !report.lost_updates.is_empty() {
                self.report_lost_updates(team_id, resource_id, next.version, &report);
            }

            return Ok(MergeOutcome::Merged(MergeResult {
                version: next.version,
                content_hash: next.content_hash,
                report,
            }));
        }

        tracing::warn!(
            resource_id,
            attempts = self.cas_attempts,
            "Snapshot contended, giving up"
        );
        Err(CoreError::TransientStore(format!(
            "session snapshot of {resource_id} changed concurrently {} times",
            self.cas_attempts
        )))
    }

    fn report_lost_updates(
        &self,
        team_id: &str,
        resource_id: &str,
        version: u64,
        report: &MergeReport,
    ) {
        for lost in &report.lost_updates {
            tracing::warn!(
                resource_id,
                kind = ?lost.key.kind,
                domain = %lost.key.domain,
                key = %lost.key.key,
                incoming_by = %lost.incoming_by,
                incoming_at = %lost.incoming_at,
                winning_by = %lost.winning_by,
                winning_at = %lost.winning_at,
                "Lost update"
            );
        }
        self.events.publish(
            PlatformEvent::new(event_types::SYNC_CONFLICT)
                .with_resource(resource_id)
                .with_team(team_id)
                .with_payload(serde_json::json!({
                    "version": version,
                    "lost_updates": report.lost_updates,
                }))
                .at(self.clock.now()),
        );
    }

    async fn load(&self, resource_id: &str) -> Result<Option<SessionSnapshot>, CoreError> {
        let store = &self.store;
        self.retry
            .run("load_snapshot", move || store.load_snapshot(resource_id))
            .await
    }

    async fn swap(&self, next: &SessionSnapshot) -> Result<bool, CoreError> {
        let store = &self.store;
        self.retry
            .run_write(
                "compare_and_swap_snapshot",
                move || store.compare_and_swap_snapshot(next),
                move || async move {
                    let stored = store.load_snapshot(&next.resource_id).await?;
                    Ok::<_, StoreError>(stored.is_some_and(|s| {
                        s.version == next.version && s.content_hash == next.content_hash
                    }))
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_defaults_to_synced() {
        let board = SyncBoard::default();
        assert_eq!(board.status_of("p1"), SyncStatus::Synced);
        assert_eq!(board.aggregate(["p1", "p2"]), SyncStatus::Synced);
    }

    #[test]
    fn board_aggregate_prefers_worst_state() {
        let board = SyncBoard::default();
        board.mark("p1", SyncStatus::Syncing);
        assert_eq!(board.aggregate(["p1", "p2"]), SyncStatus::Syncing);

        board.mark("p2", SyncStatus::Error);
        assert_eq!(board.aggregate(["p1", "p2"]), SyncStatus::Error);
        assert_eq!(board.aggregate(["p1"]), SyncStatus::Syncing);
    }
}
