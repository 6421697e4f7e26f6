use std::str::FromStr;
use std::time::Duration;

use profilehub_coordinator::CoordinatorConfig;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Bearer token validation settings.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: parse_env("PORT", 3000),
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordination
// ---------------------------------------------------------------------------

/// Where lock slots, snapshots and the resource directory live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Single-instance, in-process maps.
    Memory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!(
                "unknown store backend '{other}', expected 'memory' or 'postgres'"
            )),
        }
    }
}

/// Storage selection and service tunables.
#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    pub backend: StoreBackend,
    /// Required when `backend` is [`StoreBackend::Postgres`].
    pub database_url: Option<String>,
    /// Base URL of the proxy-health collaborator. Unset means proxies are
    /// reported as unknown.
    pub proxy_health_url: Option<String>,
    /// JSON directory document loaded into the memory backend. Ignored by
    /// the Postgres backend, which reads the directory tables.
    pub directory_seed_file: Option<String>,
    pub coordinator: CoordinatorConfig,
}

impl CoordinationConfig {
    /// Load coordination settings from environment variables.
    ///
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `STORE_BACKEND`          | `memory` |
    /// | `DATABASE_URL`           | --       |
    /// | `LOCK_DEFAULT_TTL_SECS`  | `300`    |
    /// | `LOCK_MAX_TTL_SECS`      | `14400`  |
    /// | `PRESENCE_WINDOW_SECS`   | `90`     |
    /// | `STORE_RETRY_BACKOFF_MS` | `100`    |
    /// | `MERGE_CAS_ATTEMPTS`     | `5`      |
    /// | `PROXY_HEALTH_URL`       | --       |
    /// | `DIRECTORY_SEED_FILE`    | --       |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values, or when the Postgres backend is selected
    /// without `DATABASE_URL`.
    pub fn from_env() -> Self {
        let backend: StoreBackend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "memory".into())
            .parse()
            .unwrap_or_else(|e: String| panic!("STORE_BACKEND: {e}"));

        let database_url = non_empty_env("DATABASE_URL");
        assert!(
            backend != StoreBackend::Postgres || database_url.is_some(),
            "DATABASE_URL must be set when STORE_BACKEND=postgres"
        );

        let defaults = CoordinatorConfig::default();
        let backoff_ms: u64 = parse_env(
            "STORE_RETRY_BACKOFF_MS",
            defaults.store_retry_backoff.as_millis() as u64,
        );

        let coordinator = CoordinatorConfig {
            default_lock_ttl_secs: parse_env(
                "LOCK_DEFAULT_TTL_SECS",
                defaults.default_lock_ttl_secs,
            ),
            max_lock_ttl_secs: parse_env("LOCK_MAX_TTL_SECS", defaults.max_lock_ttl_secs),
            presence_window_secs: parse_env(
                "PRESENCE_WINDOW_SECS",
                defaults.presence_window_secs,
            ),
            store_retry_backoff: Duration::from_millis(backoff_ms),
            merge_cas_attempts: parse_env("MERGE_CAS_ATTEMPTS", defaults.merge_cas_attempts),
        };
        assert!(
            coordinator.default_lock_ttl_secs <= coordinator.max_lock_ttl_secs,
            "LOCK_DEFAULT_TTL_SECS must not exceed LOCK_MAX_TTL_SECS"
        );
        assert!(
            coordinator.merge_cas_attempts > 0,
            "MERGE_CAS_ATTEMPTS must be at least 1"
        );

        Self {
            backend,
            database_url,
            proxy_health_url: non_empty_env("PROXY_HEALTH_URL"),
            directory_seed_file: non_empty_env("DIRECTORY_SEED_FILE"),
            coordinator,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read `key`, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
