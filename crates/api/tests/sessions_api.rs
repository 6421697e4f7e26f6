//! HTTP-level integration tests for session snapshot sync.

mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{
    build_test_app, drain, expect_json, get_auth, post_json_auth, post_raw_auth, t0, token,
};
use profilehub_events::event_types;
use serde_json::{json, Value};

fn cookie(key: &str, value: &str, offset_secs: i64) -> Value {
    json!({
        "kind": "cookie",
        "domain": "example.com",
        "key": key,
        "op": { "type": "added", "value": value },
        "modified_at": t0() + Duration::seconds(offset_secs),
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn never_merged_resource_reads_as_version_zero() {
    let t = build_test_app();
    let alice = token("alice", "team-1");

    let response = get_auth(&t.app, "/api/v1/sessions/p1", &alice).await;
    let json = expect_json(response, StatusCode::OK).await;

    assert_eq!(json["data"]["version"], 0);
    assert_eq!(json["data"]["entries"], json!([]));
    assert!(json["data"]["updated_at"].is_null());
    assert_eq!(json["data"]["content_hash"].as_str().unwrap().len(), 64);
}

// ---------------------------------------------------------------------------
// Merges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merge_bumps_version_and_attributes_caller() {
    let t = build_test_app();
    let alice = token("alice", "team-1");

    let mut entry = cookie("sid", "abc", 10);
    // The author always comes from the token.
    entry["modified_by"] = json!("mallory");

    let response = post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 0, "entries": [entry] }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["data"]["outcome"], "merged");
    assert_eq!(json["data"]["version"], 1);
    assert_eq!(json["data"]["report"]["applied"].as_array().unwrap().len(), 1);

    let snapshot = get_auth(&t.app, "/api/v1/sessions/p1", &alice).await;
    let snapshot = expect_json(snapshot, StatusCode::OK).await;
    assert_eq!(snapshot["data"]["version"], 1);
    assert_eq!(snapshot["data"]["content_hash"], json["data"]["content_hash"]);
    let entries = snapshot["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["key"], "sid");
    assert_eq!(entries[0]["value"], "abc");
    assert_eq!(entries[0]["last_modified_by"], "alice");
}

#[tokio::test]
async fn base_version_ahead_of_store_is_conflict_outcome() {
    let t = build_test_app();
    let alice = token("alice", "team-1");

    let response = post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 4, "entries": [cookie("sid", "abc", 0)] }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;

    assert_eq!(json["data"]["outcome"], "conflict");
    assert_eq!(json["data"]["current_version"], 0);
    assert_eq!(json["data"]["base_version"], 4);
}

#[tokio::test]
async fn removed_key_disappears_from_reads() {
    let t = build_test_app();
    let alice = token("alice", "team-1");
    post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 0, "entries": [cookie("sid", "abc", 0)] }),
    )
    .await;

    let removal = json!({
        "kind": "cookie",
        "domain": "example.com",
        "key": "sid",
        "op": { "type": "removed" },
        "modified_at": t0() + Duration::seconds(5),
    });
    let response = post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 1, "entries": [removal] }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["data"]["version"], 2);

    let snapshot = get_auth(&t.app, "/api/v1/sessions/p1", &alice).await;
    let snapshot = expect_json(snapshot, StatusCode::OK).await;
    assert_eq!(snapshot["data"]["entries"], json!([]));
}

#[tokio::test]
async fn older_concurrent_write_is_reported_lost_and_audited() {
    let mut t = build_test_app();
    let alice = token("alice", "team-1");
    let bob = token("bob", "team-1");

    post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 0, "entries": [cookie("sid", "from-alice", 20)] }),
    )
    .await;
    drain(&mut t.events);

    let response = post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &bob,
        json!({ "base_version": 0, "entries": [cookie("sid", "from-bob", 10)] }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;

    let lost = json["data"]["report"]["lost_updates"].as_array().unwrap();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0]["incoming_by"], "bob");
    assert_eq!(lost[0]["winning_by"], "alice");

    let events = drain(&mut t.events);
    let conflict = events
        .iter()
        .find(|e| e.event_type == event_types::SYNC_CONFLICT)
        .expect("lost update must be audited");
    assert_eq!(conflict.team_id.as_deref(), Some("team-1"));
}

#[tokio::test]
async fn empty_domain_is_400() {
    let t = build_test_app();
    let alice = token("alice", "team-1");
    let mut entry = cookie("sid", "abc", 0);
    entry["domain"] = json!("  ");

    let response = post_json_auth(
        &t.app,
        "/api/v1/sessions/p1/merge",
        &alice,
        json!({ "base_version": 0, "entries": [entry] }),
    )
    .await;
    let json = expect_json(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn other_teams_snapshot_is_403() {
    let t = build_test_app();
    let alice = token("alice", "team-1");

    let response = get_auth(&t.app, "/api/v1/sessions/p-other", &alice).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_merge_body_is_400_with_envelope() {
    let t = build_test_app();
    let alice = token("alice", "team-1");

    let response = post_raw_auth(&t.app, "/api/v1/sessions/p1/merge", &alice, "{not json").await;
    let json = expect_json(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].as_str().unwrap().contains("JSON"));
}
