//! Exclusive lock lifecycle: acquire, release, extend, forced takeover.
//!
//! All state lives in the shared [`LockStore`]; this type holds no lock map
//! of its own. Every write is a compare-and-swap against the version that
//! was read, so concurrent acquirers on any number of instances resolve to
//! a single winner. Expiry is lazy: an expired lock is cleared by whichever
//! call next touches the slot, and its former holder is notified then.

use std::sync::Arc;

use chrono::Duration;
use profilehub_core::clock::Clock;
use profilehub_core::error::CoreError;
use profilehub_core::locking::{
    decide_acquire, decide_release, validate_justification, validate_reason, validate_ttl_secs,
    AcquireDecision, AcquireOutcome, ExtendOutcome, Lock, LockSlot, ReleaseDecision,
    ReleaseOutcome, TakeoverOutcome,
};
use profilehub_core::store::{LockStore, StoreError};
use profilehub_events::{event_types, EventBus, PlatformEvent};

use crate::config::CoordinatorConfig;
use crate::retry::RetryPolicy;

/// How many times a call re-reads the slot after losing a CAS race before
/// reporting contention.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Why a prior holder lost their lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Released,
    Expired,
    Takeover,
}

impl EndReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::Expired => "expired",
            Self::Takeover => "takeover",
        }
    }
}

pub struct LockManager {
    store: Arc<dyn LockStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    default_ttl_secs: i64,
    max_ttl_secs: i64,
}

impl LockManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            retry: RetryPolicy::new(config.store_retry_backoff),
            default_ttl_secs: config.default_lock_ttl_secs,
            max_ttl_secs: config.max_lock_ttl_secs,
        }
    }

    /// Try to take the lock on `resource_id` for `requester`.
    ///
    /// Re-acquiring a live lock you already hold renews its TTL. A live lock
    /// held by someone else yields [`AcquireOutcome::Conflict`] immediately;
    /// waiting is the client's business.
    pub async fn acquire(
        &self,
        resource_id: &str,
        requester: &str,
        ttl_secs: Option<i64>,
        reason: Option<String>,
    ) -> Result<AcquireOutcome, CoreError> {
        let ttl = self.resolve_ttl(ttl_secs)?;
        if let Some(reason) = &reason {
            validate_reason(reason)?;
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            let slot = self.load(resource_id).await?;
            let now = self.clock.now();

            let (next, outcome, replaced) = match decide_acquire(&slot, requester, now) {
                AcquireDecision::Deny(conflict) => {
                    tracing::debug!(
                        resource_id,
                        requester,
                        holder = %conflict.holder,
                        "Lock acquire denied"
                    );
                    return Ok(AcquireOutcome::Conflict { conflict });
                }
                AcquireDecision::Renew(current) => {
                    let lock = current.renewed(now, ttl);
                    (lock.clone(), AcquireOutcome::Extended { lock }, None)
                }
                AcquireDecision::Grant { replaced_expired } => {
                    let lock = Lock::new(resource_id, requester, now, ttl, reason.clone());
                    (lock.clone(), AcquireOutcome::Acquired { lock }, replaced_expired)
                }
            };

            if !self.swap(resource_id, slot.version, Some(next)).await? {
                tracing::debug!(resource_id, requester, "Lock CAS lost, re-reading slot");
                continue;
            }

            if let Some(stale) = replaced.filter(|l| !l.is_held_by(requester)) {
                self.notify_ended(&stale, EndReason::Expired, requester, None);
            }
            match &outcome {
                AcquireOutcome::Acquired { lock } => {
                    tracing::info!(
                        resource_id,
                        user_id = requester,
                        expires_at = %lock.expires_at,
                        "Lock acquired"
                    );
                    self.events.publish(
                        PlatformEvent::new(event_types::LOCK_ACQUIRED)
                            .with_resource(resource_id)
                            .with_actor(requester)
                            .with_payload(serde_json::json!({
                                "expires_at": lock.expires_at,
                            }))
                            .at(now),
                    );
                }
                AcquireOutcome::Extended { lock } => {
                    tracing::debug!(
                        resource_id,
                        user_id = requester,
                        new_expires_at = %lock.expires_at,
                        "Lock renewed by holder"
                    );
                }
                AcquireOutcome::Conflict { .. } => {}
            }
            return Ok(outcome);
        }

        Err(self.contention(resource_id))
    }

    /// Release `requester`'s lock. Double release is a no-op; releasing
    /// someone else's lock is forbidden and changes nothing.
    pub async fn release(
        &self,
        resource_id: &str,
        requester: &str,
    ) -> Result<ReleaseOutcome, CoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let slot = self.load(resource_id).await?;
            let now = self.clock.now();

            match decide_release(&slot, requester, now) {
                ReleaseDecision::Noop => return Ok(ReleaseOutcome::AlreadyUnlocked),
                ReleaseDecision::Forbid(holder) => {
                    tracing::debug!(resource_id, requester, holder = %holder, "Release forbidden");
                    return Ok(ReleaseOutcome::Forbidden { holder });
                }
                ReleaseDecision::Clear(lock) => {
                    if !self.swap(resource_id, slot.version, None).await? {
                        continue;
                    }
                    tracing::info!(resource_id, user_id = requester, "Lock released");
                    self.notify_ended(&lock, EndReason::Released, requester, None);
                    return Ok(ReleaseOutcome::Released);
                }
                ReleaseDecision::ClearExpired(stale) => {
                    if !self.swap(resource_id, slot.version, None).await? {
                        continue;
                    }
                    self.notify_ended(&stale, EndReason::Expired, requester, None);
                    return Ok(ReleaseOutcome::AlreadyUnlocked);
                }
            }
        }

        Err(self.contention(resource_id))
    }

    /// Renew the TTL of a lock the requester holds.
    pub async fn extend(
        &self,
        resource_id: &str,
        requester: &str,
        ttl_secs: Option<i64>,
    ) -> Result<ExtendOutcome, CoreError> {
        let ttl = self.resolve_ttl(ttl_secs)?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let slot = self.load(resource_id).await?;
            let now = self.clock.now();

            let current = match slot.live(now) {
                None => return Ok(ExtendOutcome::NotLocked),
                Some(lock) if !lock.is_held_by(requester) => {
                    return Ok(ExtendOutcome::Forbidden {
                        holder: lock.holder.clone(),
                    })
                }
                Some(lock) => lock.clone(),
            };

            let renewed = current.renewed(now, ttl);
            if self
                .swap(resource_id, slot.version, Some(renewed.clone()))
                .await?
            {
                tracing::debug!(
                    resource_id,
                    user_id = requester,
                    new_expires_at = %renewed.expires_at,
                    "Lock extended"
                );
                return Ok(ExtendOutcome::Extended { lock: renewed });
            }
        }

        Err(self.contention(resource_id))
    }

    /// Revoke whatever lock exists and grant a fresh one to `requester`.
    ///
    /// The prior holder (if any, and if not the requester) receives a
    /// `lock.released` event carrying the justification.
    pub async fn force_takeover(
        &self,
        resource_id: &str,
        requester: &str,
        justification: &str,
        ttl_secs: Option<i64>,
    ) -> Result<TakeoverOutcome, CoreError> {
        validate_justification(justification)?;
        let ttl = self.resolve_ttl(ttl_secs)?;
        let justification = justification.trim().to_string();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let slot = self.load(resource_id).await?;
            let now = self.clock.now();

            let lock = Lock::new(
                resource_id,
                requester,
                now,
                ttl,
                Some(justification.clone()),
            );
            if !self
                .swap(resource_id, slot.version, Some(lock.clone()))
                .await?
            {
                continue;
            }

            let revoked = slot.live(now).cloned();
            match (&revoked, slot.expired(now)) {
                (Some(prior), _) if !prior.is_held_by(requester) => {
                    tracing::warn!(
                        resource_id,
                        user_id = requester,
                        prior_holder = %prior.holder,
                        justification = %justification,
                        "Lock taken over"
                    );
                    self.notify_ended(prior, EndReason::Takeover, requester, Some(&justification));
                }
                (None, Some(stale)) if !stale.is_held_by(requester) => {
                    self.notify_ended(stale, EndReason::Expired, requester, None);
                }
                _ => {
                    tracing::info!(resource_id, user_id = requester, "Lock granted by takeover");
                }
            }

            return Ok(TakeoverOutcome { lock, revoked });
        }

        Err(self.contention(resource_id))
    }

    /// The live lock on `resource_id`, if any. An expired lock found here is
    /// cleared and its holder notified.
    pub async fn status(&self, resource_id: &str) -> Result<Option<Lock>, CoreError> {
        let slot = self.load(resource_id).await?;
        let now = self.clock.now();

        if let Some(stale) = slot.expired(now) {
            // Losing this race is fine: someone else already rewrote the slot.
            if self.swap(resource_id, slot.version, None).await? {
                self.notify_ended(stale, EndReason::Expired, &stale.holder, None);
            }
            return Ok(None);
        }
        Ok(slot.live(now).cloned())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn resolve_ttl(&self, ttl_secs: Option<i64>) -> Result<Duration, CoreError> {
        validate_ttl_secs(ttl_secs.unwrap_or(self.default_ttl_secs), self.max_ttl_secs)
    }

    async fn load(&self, resource_id: &str) -> Result<LockSlot, CoreError> {
        let store = &self.store;
        self.retry
            .run("load_lock", move || store.load_lock(resource_id))
            .await
    }

    async fn swap(
        &self,
        resource_id: &str,
        expected_version: i64,
        next: Option<Lock>,
    ) -> Result<bool, CoreError> {
        let store = &self.store;
        let next = &next;
        self.retry
            .run_write(
                "compare_and_swap_lock",
                move || store.compare_and_swap_lock(resource_id, expected_version, next.clone()),
                move || async move {
                    let slot = store.load_lock(resource_id).await?;
                    Ok::<_, StoreError>(
                        slot.version == expected_version + 1 && slot.lock == *next,
                    )
                },
            )
            .await
    }

    fn contention(&self, resource_id: &str) -> CoreError {
        tracing::warn!(resource_id, "Lock slot contended, giving up");
        CoreError::TransientStore(format!(
            "lock on {resource_id} changed concurrently {MAX_CAS_ATTEMPTS} times"
        ))
    }

    /// Tell the former holder their lock is gone. Untargeted for plain
    /// releases (it only announces availability).
    fn notify_ended(
        &self,
        prior: &Lock,
        reason: EndReason,
        actor: &str,
        justification: Option<&str>,
    ) {
        let mut event = PlatformEvent::new(event_types::LOCK_RELEASED)
            .with_resource(prior.resource_id.clone())
            .with_actor(actor)
            .with_payload(serde_json::json!({
                "reason": reason.as_str(),
                "prior_holder": prior.holder,
                "acquired_at": prior.acquired_at,
                "expires_at": prior.expires_at,
                "justification": justification,
                "new_holder": (reason != EndReason::Released).then_some(actor),
            }))
            .at(self.clock.now());
        if reason != EndReason::Released {
            event = event.with_target(prior.holder.clone());
        }
        self.events.publish(event);
    }
}
