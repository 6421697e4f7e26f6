use std::time::Duration;

use profilehub_core::locking::{DEFAULT_LOCK_TTL_SECS, MAX_LOCK_TTL_SECS};
use profilehub_core::presence::DEFAULT_PRESENCE_WINDOW_SECS;

use crate::retry::DEFAULT_RETRY_BACKOFF;

/// Default number of re-merge attempts when a concurrent writer wins the
/// snapshot compare-and-swap.
pub const DEFAULT_MERGE_CAS_ATTEMPTS: u32 = 5;

/// Tunables shared by the coordination services.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// TTL applied when an acquire does not ask for one.
    pub default_lock_ttl_secs: i64,
    /// Upper bound on any requested TTL.
    pub max_lock_ttl_secs: i64,
    /// Presence staleness window.
    pub presence_window_secs: i64,
    /// Wait before retrying a transient store failure.
    pub store_retry_backoff: Duration,
    pub merge_cas_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            max_lock_ttl_secs: MAX_LOCK_TTL_SECS,
            presence_window_secs: DEFAULT_PRESENCE_WINDOW_SECS,
            store_retry_backoff: DEFAULT_RETRY_BACKOFF,
            merge_cas_attempts: DEFAULT_MERGE_CAS_ATTEMPTS,
        }
    }
}
