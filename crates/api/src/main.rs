use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use profilehub_api::config::{CoordinationConfig, ServerConfig, StoreBackend};
use profilehub_api::notifications::NotificationRouter;
use profilehub_api::state::AppState;
use profilehub_api::{app, ws};
use profilehub_coordinator::proxy_health::{HttpProxyHealthClient, UnknownProxyHealth};
use profilehub_coordinator::{Backends, CoordinationServices};
use profilehub_core::clock::SystemClock;
use profilehub_core::memory::{DirectorySeed, InMemoryStore};
use profilehub_core::store::ProxyHealthSource;
use profilehub_db::{DbPool, PgStore};
use profilehub_events::EventBus;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "profilehub_api=debug,profilehub_coordinator=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let coordination = CoordinationConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = coordination.backend.as_str(),
        "Loaded server configuration"
    );

    // --- Storage ---
    let (backends, pool) = build_backends(&coordination).await;

    // --- Event bus + services ---
    let event_bus = Arc::new(EventBus::default());
    let services = CoordinationServices::new(
        backends.clone(),
        Arc::clone(&event_bus),
        Arc::new(SystemClock),
        &coordination.coordinator,
    );
    tracing::info!("Coordination services started");

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Spawn notification router (routes events to users via WebSocket).
    let notification_router =
        NotificationRouter::new(backends.directory.clone(), Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        services,
        ws_manager: Arc::clone(&ws_manager),
        backend: coordination.backend,
        pool,
    };
    let app = app::build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let cleanup_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;
    heartbeat_handle.abort();

    // The services hold clones of the bus, so the router is stopped
    // explicitly rather than by channel close.
    router_handle.abort();
    let _ = tokio::time::timeout(cleanup_timeout, router_handle).await;
    tracing::info!("Notification router stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Build the store seams for the configured backend.
///
/// # Panics
///
/// Panics if the database cannot be reached or migrated, the directory seed
/// cannot be loaded, or the proxy-health URL is unusable. All are startup
/// misconfigurations.
async fn build_backends(coordination: &CoordinationConfig) -> (Backends, Option<DbPool>) {
    let proxies: Arc<dyn ProxyHealthSource> = match &coordination.proxy_health_url {
        Some(url) => {
            tracing::info!(url = %url, "Using proxy-health collaborator");
            Arc::new(HttpProxyHealthClient::new(url.clone()).expect("Failed to build HTTP client"))
        }
        None => {
            tracing::warn!("PROXY_HEALTH_URL not set, proxy health reported as unknown");
            Arc::new(UnknownProxyHealth)
        }
    };

    match coordination.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; state is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            match &coordination.directory_seed_file {
                Some(path) => {
                    let raw = std::fs::read_to_string(path)
                        .unwrap_or_else(|e| panic!("Failed to read {path}: {e}"));
                    let seed = DirectorySeed::from_json(&raw)
                        .unwrap_or_else(|e| panic!("Invalid directory seed {path}: {e}"));
                    let resources = seed.resources.len();
                    store
                        .seed(seed)
                        .unwrap_or_else(|e| panic!("Invalid directory seed {path}: {e}"));
                    tracing::info!(path = %path, resources, "Directory seeded");
                }
                None => tracing::warn!(
                    "DIRECTORY_SEED_FILE not set; every resource lookup will be not found"
                ),
            }
            let mut backends = Backends::in_memory(store);
            backends.proxies = proxies;
            (backends, None)
        }
        StoreBackend::Postgres => {
            let database_url = coordination
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let pool = profilehub_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            profilehub_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            profilehub_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let store = Arc::new(PgStore::new(pool.clone()));
            let backends = Backends {
                locks: store.clone(),
                snapshots: store.clone(),
                directory: store,
                proxies,
            };
            (backends, Some(pool))
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
