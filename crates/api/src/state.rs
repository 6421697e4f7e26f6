use std::sync::Arc;

use profilehub_coordinator::CoordinationServices;
use profilehub_db::DbPool;

use crate::config::{ServerConfig, StoreBackend};
use crate::ws::WsManager;

/// Shared application state available to all handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub services: CoordinationServices,
    pub ws_manager: Arc<WsManager>,
    pub backend: StoreBackend,
    /// Present only with the Postgres backend; used by the liveness check.
    pub pool: Option<DbPool>,
}
