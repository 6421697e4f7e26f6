//! Exclusive resource lock rules.
//!
//! A resource is either unlocked or held by exactly one user until
//! `expires_at`. Expiry is lazy: nothing sweeps old locks, every read treats
//! a lock with `expires_at < now` as absent. The store only has to provide a
//! versioned compare-and-swap on the lock slot; the decisions below are pure.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ResourceId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// TTL constants
// ---------------------------------------------------------------------------

/// Default lock time-to-live in seconds (5 minutes).
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Smallest TTL a caller may request. Clients renew at less than half the
/// TTL, so anything shorter makes spurious expiry likely.
pub const MIN_LOCK_TTL_SECS: i64 = 10;

/// Largest TTL a caller may request (4 hours).
pub const MAX_LOCK_TTL_SECS: i64 = 14_400;

/// Maximum length of a takeover justification or lock reason.
pub const MAX_REASON_LENGTH: usize = 500;

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// An exclusive claim on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub resource_id: ResourceId,
    pub holder: UserId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub reason: Option<String>,
}

impl Lock {
    pub fn new(
        resource_id: impl Into<ResourceId>,
        holder: impl Into<UserId>,
        now: Timestamp,
        ttl: Duration,
        reason: Option<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            holder: holder.into(),
            acquired_at: now,
            expires_at: now + ttl,
            reason,
        }
    }

    /// A lock whose `expires_at` lies strictly before `now` no longer exists.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }

    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.holder == user_id
    }

    /// Same holder and acquisition time, new expiry.
    pub fn renewed(&self, now: Timestamp, ttl: Duration) -> Self {
        Self {
            expires_at: now + ttl,
            ..self.clone()
        }
    }

    pub fn conflict(&self) -> LockConflict {
        LockConflict {
            holder: self.holder.clone(),
            acquired_at: self.acquired_at,
            expires_at: self.expires_at,
        }
    }
}

/// Lock slot as read from the backing store.
///
/// `version` increments on every successful write and is the
/// compare-and-swap token. A resource that never had a lock reads as
/// version 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockSlot {
    pub lock: Option<Lock>,
    pub version: i64,
}

impl LockSlot {
    /// The lock if it is still live at `now`.
    pub fn live(&self, now: Timestamp) -> Option<&Lock> {
        self.lock.as_ref().filter(|l| !l.is_expired(now))
    }

    /// The lock if it has expired but was never cleared.
    pub fn expired(&self, now: Timestamp) -> Option<&Lock> {
        self.lock.as_ref().filter(|l| l.is_expired(now))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Identity of the party currently holding a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    pub holder: UserId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl LockConflict {
    /// User-facing description: "in use by X since T".
    pub fn message(&self) -> String {
        format!(
            "in use by {} since {}",
            self.holder,
            self.acquired_at.to_rfc3339()
        )
    }
}

/// Result of an acquire call. Conflict is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcquireOutcome {
    Acquired { lock: Lock },
    /// The requester already held the lock; its TTL was renewed.
    Extended { lock: Lock },
    Conflict { conflict: LockConflict },
}

/// Result of a release call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Released,
    /// No live lock existed. Double release is safe.
    AlreadyUnlocked,
    /// Someone else holds the lock; nothing was changed.
    Forbidden { holder: UserId },
}

/// Result of an explicit extend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtendOutcome {
    Extended { lock: Lock },
    NotLocked,
    Forbidden { holder: UserId },
}

/// Result of a forced takeover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TakeoverOutcome {
    pub lock: Lock,
    /// The live lock that was revoked, if any.
    pub revoked: Option<Lock>,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// What an acquire attempt should write, given the slot it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireDecision {
    /// Write a fresh lock. `replaced_expired` is the stale lock being cleared.
    Grant { replaced_expired: Option<Lock> },
    /// Requester is the live holder: write a renewed lock.
    Renew(Lock),
    /// Someone else holds a live lock: write nothing.
    Deny(LockConflict),
}

/// Decide an acquire for `requester` against `slot` at `now`.
pub fn decide_acquire(slot: &LockSlot, requester: &str, now: Timestamp) -> AcquireDecision {
    match slot.live(now) {
        Some(lock) if lock.is_held_by(requester) => AcquireDecision::Renew(lock.clone()),
        Some(lock) => AcquireDecision::Deny(lock.conflict()),
        None => AcquireDecision::Grant {
            replaced_expired: slot.expired(now).cloned(),
        },
    }
}

/// What a release attempt should do, given the slot it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseDecision {
    /// Clear the slot. Carries the lock being removed.
    Clear(Lock),
    /// Slot holds only an expired lock; clear it but report already unlocked.
    ClearExpired(Lock),
    Noop,
    Forbid(UserId),
}

/// Decide a release for `requester` against `slot` at `now`.
pub fn decide_release(slot: &LockSlot, requester: &str, now: Timestamp) -> ReleaseDecision {
    if let Some(lock) = slot.live(now) {
        return if lock.is_held_by(requester) {
            ReleaseDecision::Clear(lock.clone())
        } else {
            ReleaseDecision::Forbid(lock.holder.clone())
        };
    }
    match slot.expired(now) {
        Some(stale) => ReleaseDecision::ClearExpired(stale.clone()),
        None => ReleaseDecision::Noop,
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a requested TTL against `[MIN_LOCK_TTL_SECS, max_secs]`.
pub fn validate_ttl_secs(secs: i64, max_secs: i64) -> Result<Duration, CoreError> {
    if secs < MIN_LOCK_TTL_SECS {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_SECS} seconds, got {secs}"
        )));
    }
    if secs > max_secs {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at most {max_secs} seconds, got {secs}"
        )));
    }
    Ok(Duration::seconds(secs))
}

/// A takeover must say why it is overriding another user.
pub fn validate_justification(justification: &str) -> Result<(), CoreError> {
    let trimmed = justification.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Takeover justification must not be empty".into(),
        ));
    }
    validate_reason(trimmed)
}

pub fn validate_reason(reason: &str) -> Result<(), CoreError> {
    if reason.len() > MAX_REASON_LENGTH {
        return Err(CoreError::Validation(format!(
            "Reason exceeds maximum length of {MAX_REASON_LENGTH}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
