mod common;

use assert_matches::assert_matches;
use common::{drain, harness, policy, resource, seed_versions};
use profilehub_core::error::CoreError;
use profilehub_core::fingerprint::{ComplianceStatus, DeviceClass};
use profilehub_events::event_types;

#[tokio::test]
async fn three_behind_with_limit_two_is_violation_citing_both() {
    let mut h = harness();
    h.store.insert_resource(resource("p1", "chrome", "windows", 2, Some("pol")));
    seed_versions(&h.store, "p1", 5);
    h.services
        .policies
        .put_policy(policy("pol", 2, 4, &[]))
        .await
        .unwrap();

    let eval = h.services.policies.evaluate("pol", "p1").await.unwrap();

    assert_eq!(eval.status, ComplianceStatus::Violation);
    assert_eq!(eval.versions_behind, 3);
    assert_eq!(eval.device_class, DeviceClass::Desktop);
    assert_eq!(eval.details.len(), 1);
    assert!(eval.details[0].contains('2'));
    assert!(eval.details[0].contains('3'));

    let events = drain(&mut h.events);
    let violation = events
        .iter()
        .find(|e| e.event_type == event_types::POLICY_VIOLATION)
        .expect("violation should be published");
    assert_eq!(violation.team_id.as_deref(), Some("team-1"));
    assert_eq!(violation.resource_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn disallowed_browser_is_violation_even_when_current() {
    let h = harness();
    h.store.insert_resource(resource("p1", "safari", "macos", 3, Some("pol")));
    seed_versions(&h.store, "p1", 3);
    h.services
        .policies
        .put_policy(policy("pol", 2, 2, &["chrome", "firefox"]))
        .await
        .unwrap();

    let eval = h.services.policies.evaluate("pol", "p1").await.unwrap();

    assert_eq!(eval.status, ComplianceStatus::Violation);
    assert_eq!(eval.versions_behind, 0);
    assert!(eval.details[0].contains("safari"));
    assert!(eval.auto_remediation.is_none());
}

#[tokio::test]
async fn mobile_threshold_applies_to_mobile_profiles() {
    let mut h = harness();
    h.store.insert_resource(resource("m1", "chrome", "android", 1, Some("pol")));
    seed_versions(&h.store, "m1", 4);
    h.services
        .policies
        .put_policy(policy("pol", 1, 3, &[]))
        .await
        .unwrap();
    drain(&mut h.events);

    let eval = h.services.policies.evaluate("pol", "m1").await.unwrap();

    assert_eq!(eval.device_class, DeviceClass::Mobile);
    assert_eq!(eval.status, ComplianceStatus::Compliant);
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn auto_upgrade_flags_lag_only_violation() {
    let h = harness();
    h.store.insert_resource(resource("p1", "chrome", "linux", 1, Some("pol")));
    seed_versions(&h.store, "p1", 4);
    let mut pol = policy("pol", 1, 1, &["chrome"]);
    pol.auto_upgrade = true;
    h.services.policies.put_policy(pol).await.unwrap();

    let eval = h.services.policies.evaluate("pol", "p1").await.unwrap();

    assert_eq!(eval.status, ComplianceStatus::Violation);
    let fix = eval.auto_remediation.expect("lag-only violation is remediable");
    assert_eq!(fix.upgrade_to_version, 4);
}

#[tokio::test]
async fn negative_threshold_is_rejected() {
    let h = harness();
    let result = h.services.policies.put_policy(policy("pol", -1, 2, &[])).await;
    assert_matches!(result, Err(CoreError::Validation(_)));
    assert_matches!(
        h.services.policies.get_policy("pol").await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn stored_policy_has_normalized_browsers() {
    let h = harness();
    h.services
        .policies
        .put_policy(policy("pol", 2, 2, &["Chrome", " FIREFOX "]))
        .await
        .unwrap();

    let stored = h.services.policies.get_policy("pol").await.unwrap();
    let browsers: Vec<&str> = stored.allowed_browsers.iter().map(String::as_str).collect();
    assert_eq!(browsers, vec!["chrome", "firefox"]);
}

#[tokio::test]
async fn missing_resource_or_policy_is_not_found() {
    let h = harness();
    h.services
        .policies
        .put_policy(policy("pol", 2, 2, &[]))
        .await
        .unwrap();

    assert_matches!(
        h.services.policies.evaluate("pol", "ghost").await,
        Err(CoreError::NotFound { entity: "resource", .. })
    );
    assert_matches!(
        h.services.policies.evaluate("nope", "ghost").await,
        Err(CoreError::NotFound {
            entity: "fingerprint_policy",
            ..
        })
    );
}
