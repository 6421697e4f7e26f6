mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::{drain, harness, t0};
use profilehub_core::error::CoreError;
use profilehub_core::locking::{AcquireOutcome, ExtendOutcome, ReleaseOutcome};
use profilehub_core::store::LockStore;
use profilehub_events::event_types;

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_free_resource_grants_lock() {
    let h = harness();

    let outcome = h
        .services
        .locks
        .acquire("p1", "alice", Some(300), Some("checkout flow".into()))
        .await
        .unwrap();

    assert_matches!(outcome, AcquireOutcome::Acquired { lock } => {
        assert_eq!(lock.holder, "alice");
        assert_eq!(lock.acquired_at, t0());
        assert_eq!(lock.expires_at, t0() + Duration::seconds(300));
        assert_eq!(lock.reason.as_deref(), Some("checkout flow"));
    });
}

#[tokio::test]
async fn acquire_held_resource_reports_holder() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", None, None).await.unwrap();
    h.clock.advance(Duration::seconds(30));

    let outcome = h.services.locks.acquire("p1", "bob", None, None).await.unwrap();

    assert_matches!(outcome, AcquireOutcome::Conflict { conflict } => {
        assert_eq!(conflict.holder, "alice");
        assert_eq!(conflict.acquired_at, t0());
        assert!(conflict.message().starts_with("in use by alice since"));
    });
}

#[tokio::test]
async fn reacquire_by_holder_renews_ttl() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", Some(60), None).await.unwrap();
    h.clock.advance(Duration::seconds(50));

    let outcome = h
        .services
        .locks
        .acquire("p1", "alice", Some(60), None)
        .await
        .unwrap();

    assert_matches!(outcome, AcquireOutcome::Extended { lock } => {
        assert_eq!(lock.acquired_at, t0());
        assert_eq!(lock.expires_at, t0() + Duration::seconds(110));
    });
}

#[tokio::test]
async fn ttl_outside_bounds_is_rejected() {
    let h = harness();
    let too_short = h.services.locks.acquire("p1", "alice", Some(5), None).await;
    assert_matches!(too_short, Err(CoreError::Validation(_)));

    let too_long = h
        .services
        .locks
        .acquire("p1", "alice", Some(100_000), None)
        .await;
    assert_matches!(too_long, Err(CoreError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_have_exactly_one_winner() {
    let h = harness();
    let mut handles = Vec::new();
    for i in 0..16 {
        let locks = h.services.locks.clone();
        handles.push(tokio::spawn(async move {
            locks
                .acquire("p1", &format!("user-{i}"), None, None)
                .await
                .unwrap()
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            AcquireOutcome::Acquired { lock } => winners.push(lock.holder),
            AcquireOutcome::Conflict { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let slot = h.store.load_lock("p1").await.unwrap();
    assert_eq!(slot.lock.unwrap().holder, winners[0]);
}

/// Lock held by A at t0 with a 300 s TTL; at t0+400 s B acquires and A is
/// told their lock is gone.
#[tokio::test]
async fn expired_lock_is_replaced_and_prior_holder_notified() {
    let mut h = harness();
    h.services.locks.acquire("p1", "alice", Some(300), None).await.unwrap();
    drain(&mut h.events);

    h.clock.advance(Duration::seconds(400));
    let outcome = h.services.locks.acquire("p1", "bob", None, None).await.unwrap();
    assert_matches!(outcome, AcquireOutcome::Acquired { lock } => {
        assert_eq!(lock.holder, "bob");
    });

    let events = drain(&mut h.events);
    let released = events
        .iter()
        .find(|e| e.event_type == event_types::LOCK_RELEASED)
        .expect("prior holder should be notified");
    assert_eq!(released.target_user_id.as_deref(), Some("alice"));
    assert_eq!(released.resource_id.as_deref(), Some("p1"));
    assert_eq!(released.payload["reason"], "expired");
    assert_eq!(released.payload["new_holder"], "bob");
}

#[tokio::test]
async fn lock_expiring_exactly_now_is_still_live() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", Some(60), None).await.unwrap();
    h.clock.advance(Duration::seconds(60));

    let outcome = h.services.locks.acquire("p1", "bob", None, None).await.unwrap();
    assert_matches!(outcome, AcquireOutcome::Conflict { .. });
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn release_by_holder_then_double_release_is_noop() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", None, None).await.unwrap();

    let first = h.services.locks.release("p1", "alice").await.unwrap();
    let second = h.services.locks.release("p1", "alice").await.unwrap();

    assert_eq!(first, ReleaseOutcome::Released);
    assert_eq!(second, ReleaseOutcome::AlreadyUnlocked);
    assert!(h.services.locks.status("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn release_by_non_holder_is_forbidden_and_changes_nothing() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", None, None).await.unwrap();
    let before = h.store.load_lock("p1").await.unwrap();

    let outcome = h.services.locks.release("p1", "mallory").await.unwrap();

    assert_eq!(
        outcome,
        ReleaseOutcome::Forbidden {
            holder: "alice".into()
        }
    );
    let after = h.store.load_lock("p1").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn release_of_expired_lock_reports_already_unlocked() {
    let h = harness();
    h.services.locks.acquire("p1", "alice", Some(60), None).await.unwrap();
    h.clock.advance(Duration::seconds(61));

    let outcome = h.services.locks.release("p1", "bob").await.unwrap();
    assert_eq!(outcome, ReleaseOutcome::AlreadyUnlocked);
    assert!(h.store.load_lock("p1").await.unwrap().lock.is_none());
}

// ---------------------------------------------------------------------------
// Extend / status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn extend_outcomes() {
    let h = harness();
    assert_eq!(
        h.services.locks.extend("p1", "alice", None).await.unwrap(),
        ExtendOutcome::NotLocked
    );

    h.services.locks.acquire("p1", "alice", Some(60), None).await.unwrap();
    h.clock.advance(Duration::seconds(30));

    assert_matches!(
        h.services.locks.extend("p1", "bob", None).await.unwrap(),
        ExtendOutcome::Forbidden { holder } if holder == "alice"
    );
    assert_matches!(
        h.services.locks.extend("p1", "alice", Some(120)).await.unwrap(),
        ExtendOutcome::Extended { lock } => {
            assert_eq!(lock.expires_at, t0() + Duration::seconds(150));
        }
    );
}

#[tokio::test]
async fn status_clears_expired_lock_lazily() {
    let mut h = harness();
    h.services.locks.acquire("p1", "alice", Some(60), None).await.unwrap();
    assert!(h.services.locks.status("p1").await.unwrap().is_some());
    drain(&mut h.events);

    h.clock.advance(Duration::seconds(61));
    assert!(h.services.locks.status("p1").await.unwrap().is_none());

    let slot = h.store.load_lock("p1").await.unwrap();
    assert!(slot.lock.is_none());
    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target_user_id.as_deref(), Some("alice"));
}

// ---------------------------------------------------------------------------
// Takeover
// ---------------------------------------------------------------------------

#[tokio::test]
async fn takeover_revokes_and_notifies_prior_holder() {
    let mut h = harness();
    h.services.locks.acquire("p1", "alice", None, None).await.unwrap();
    drain(&mut h.events);

    let outcome = h
        .services
        .locks
        .force_takeover("p1", "bob", "customer escalation", None)
        .await
        .unwrap();

    assert_eq!(outcome.lock.holder, "bob");
    assert_eq!(outcome.revoked.map(|l| l.holder).as_deref(), Some("alice"));

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    let released = &events[0];
    assert_eq!(released.event_type, event_types::LOCK_RELEASED);
    assert_eq!(released.target_user_id.as_deref(), Some("alice"));
    assert_eq!(released.payload["reason"], "takeover");
    assert_eq!(released.payload["justification"], "customer escalation");
}

#[tokio::test]
async fn takeover_of_free_resource_simply_grants() {
    let mut h = harness();
    let outcome = h
        .services
        .locks
        .force_takeover("p1", "bob", "nobody home", None)
        .await
        .unwrap();

    assert_eq!(outcome.lock.holder, "bob");
    assert!(outcome.revoked.is_none());
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn takeover_requires_justification() {
    let h = harness();
    let result = h.services.locks.force_takeover("p1", "bob", "   ", None).await;
    assert_matches!(result, Err(CoreError::Validation(_)));
}
