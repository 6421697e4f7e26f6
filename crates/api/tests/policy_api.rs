//! HTTP-level integration tests for fingerprint policies.

mod common;

use axum::http::StatusCode;
use common::{build_test_app, drain, expect_json, get_auth, post_json_auth, put_json_auth, token};
use profilehub_events::event_types;
use serde_json::json;

fn strict_policy() -> serde_json::Value {
    json!({
        "max_versions_behind_desktop": 0,
        "max_versions_behind_mobile": 0,
        "allowed_browsers": ["Chrome", "firefox"],
        "auto_upgrade": true,
    })
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_then_get_policy() {
    let t = build_test_app();
    let admin = token("admin", "team-1");

    let response = put_json_auth(&t.app, "/api/v1/policies/pol-1", &admin, strict_policy()).await;
    let stored = expect_json(response, StatusCode::OK).await;
    assert_eq!(stored["data"]["id"], "pol-1");
    assert_eq!(stored["data"]["team_id"], "team-1");
    assert_eq!(stored["data"]["allowed_browsers"], json!(["chrome", "firefox"]));

    let response = get_auth(&t.app, "/api/v1/policies/pol-1", &admin).await;
    let fetched = expect_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"], stored["data"]);
}

#[tokio::test]
async fn negative_threshold_is_400() {
    let t = build_test_app();
    let admin = token("admin", "team-1");

    let response = put_json_auth(
        &t.app,
        "/api/v1/policies/pol-1",
        &admin,
        json!({ "max_versions_behind_desktop": -1, "max_versions_behind_mobile": 2 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_policy_is_404() {
    let t = build_test_app();
    let admin = token("admin", "team-1");

    let response = get_auth(&t.app, "/api/v1/policies/missing", &admin).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn other_team_cannot_read_or_overwrite_policy() {
    let t = build_test_app();
    let admin = token("admin", "team-1");
    let outsider = token("eve", "team-2");
    put_json_auth(&t.app, "/api/v1/policies/pol-1", &admin, strict_policy()).await;

    let read = get_auth(&t.app, "/api/v1/policies/pol-1", &outsider).await;
    assert_eq!(read.status(), StatusCode::FORBIDDEN);

    let write = put_json_auth(&t.app, "/api/v1/policies/pol-1", &outsider, strict_policy()).await;
    assert_eq!(write.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lagging_resource_is_violation_and_announced() {
    let mut t = build_test_app();
    let admin = token("admin", "team-1");
    put_json_auth(&t.app, "/api/v1/policies/pol-1", &admin, strict_policy()).await;
    drain(&mut t.events);

    // p1 runs version 2 of 3.
    let response =
        post_json_auth(&t.app, "/api/v1/policies/pol-1/evaluate/p1", &admin, json!({})).await;
    let json = expect_json(response, StatusCode::OK).await;

    assert_eq!(json["data"]["status"], "violation");
    assert_eq!(json["data"]["versions_behind"], 1);
    assert_eq!(
        json["data"]["details"],
        json!(["versions behind: 1 exceeds limit: 0"])
    );
    assert_eq!(json["data"]["auto_remediation"]["upgrade_to_version"], 3);

    let events = drain(&mut t.events);
    let violation = events
        .iter()
        .find(|e| e.event_type == event_types::POLICY_VIOLATION)
        .expect("violation must be published");
    assert_eq!(violation.team_id.as_deref(), Some("team-1"));
    assert_eq!(violation.resource_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn evaluating_other_teams_resource_is_403() {
    let t = build_test_app();
    let admin = token("admin", "team-1");
    put_json_auth(&t.app, "/api/v1/policies/pol-1", &admin, strict_policy()).await;

    let response = post_json_auth(
        &t.app,
        "/api/v1/policies/pol-1/evaluate/p-other",
        &admin,
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn resource_without_version_history_is_404() {
    let t = build_test_app();
    let admin = token("admin", "team-1");
    put_json_auth(&t.app, "/api/v1/policies/pol-1", &admin, strict_policy()).await;

    // p2 has no fingerprint versions seeded.
    let response =
        post_json_auth(&t.app, "/api/v1/policies/pol-1/evaluate/p2", &admin, json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
