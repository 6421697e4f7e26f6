//! Shared helpers for API integration tests.
//!
//! The app is built over the in-memory store with a manual clock, so no
//! database is needed and lock expiry can be driven explicitly.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use profilehub_api::app::build_app;
use profilehub_api::auth::jwt::{Claims, JwtConfig};
use profilehub_api::config::{ServerConfig, StoreBackend};
use profilehub_api::state::AppState;
use profilehub_api::ws::WsManager;
use profilehub_coordinator::{Backends, CoordinationServices, CoordinatorConfig};
use profilehub_core::clock::ManualClock;
use profilehub_core::fingerprint::{FingerprintVersion, Resource};
use profilehub_core::memory::InMemoryStore;
use profilehub_core::types::Timestamp;
use profilehub_events::{EventBus, PlatformEvent};
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "api-test-secret-that-is-long-enough";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub events: broadcast::Receiver<PlatformEvent>,
}

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
    }
}

/// Build the full application over a seeded in-memory store.
///
/// Seeds:
/// - `p1`, `p2`: team-1, chrome on Windows, fingerprint version 2 of 3
/// - `p-other`: team-2
pub fn build_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    store.insert_resource(resource("p1", "team-1"));
    store.insert_resource(resource("p2", "team-1"));
    store.insert_resource(resource("p-other", "team-2"));
    for v in 1..=3 {
        store.insert_fingerprint_version(FingerprintVersion {
            resource_id: "p1".into(),
            version: v,
            browser_version: format!("12{v}.0"),
            created_at: t0(),
            is_latest: v == 3,
        });
    }

    let clock = Arc::new(ManualClock::new(t0()));
    let bus = Arc::new(EventBus::default());
    let events = bus.subscribe();
    let coordinator = CoordinatorConfig {
        store_retry_backoff: Duration::from_millis(1),
        ..CoordinatorConfig::default()
    };
    let services = CoordinationServices::new(
        Backends::in_memory(store.clone()),
        bus,
        clock.clone(),
        &coordinator,
    );

    let state = AppState {
        config: Arc::new(test_config()),
        services,
        ws_manager: Arc::new(WsManager::new()),
        backend: StoreBackend::Memory,
        pool: None,
    };

    TestApp {
        app: build_app(state.clone()),
        state,
        store,
        clock,
        events,
    }
}

pub fn resource(id: &str, team_id: &str) -> Resource {
    Resource {
        id: id.into(),
        team_id: team_id.into(),
        tags: Vec::new(),
        browser: "chrome".into(),
        os: "windows".into(),
        fingerprint_version: 2,
        policy_id: None,
    }
}

/// Sign a token for `user` in `team`, valid for 15 minutes of real time.
pub fn token(user: &str, team: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.to_string(),
        team_id: team.to_string(),
        exp: now + 900,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token encoding should succeed")
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<PlatformEvent>) -> Vec<PlatformEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

/// POST a body verbatim, for requests that are not valid JSON.
pub async fn post_raw_auth(app: &Router, uri: &str, token: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn put_json_auth(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the parsed body.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
