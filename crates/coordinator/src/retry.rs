//! Single retry for transient store failures.
//!
//! Every store call made by a coordinator goes through [`RetryPolicy::run`]:
//! a [`StoreError::Transient`] is retried once after a fixed backoff, then
//! surfaced as the retryable [`CoreError::TransientStore`].
//!
//! Compare-and-swap writes go through [`RetryPolicy::run_write`] instead. A
//! transient error there does not say whether the write committed, and
//! re-issuing a committed CAS would lose to itself, so the stored state is
//! checked before the write is sent again.

use std::future::Future;
use std::time::Duration;

use profilehub_core::error::CoreError;
use profilehub_core::store::StoreError;

/// Default wait before the single retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Run `op`, retrying once if it fails transiently.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(StoreError::Transient(msg)) => {
                tracing::warn!(
                    operation,
                    error = %msg,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "Transient store error, retrying once"
                );
                tokio::time::sleep(self.backoff).await;
                op().await.map_err(|e| {
                    tracing::error!(operation, error = %e, "Store call failed after retry");
                    into_core(e)
                })
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "Store call failed");
                Err(into_core(e))
            }
        }
    }

    /// Run a conditional write, retrying once if it fails transiently.
    ///
    /// After a transient failure `landed` reports whether the store already
    /// holds exactly what `write` tried to put there. If so the write counts
    /// as done; otherwise it is sent once more.
    pub async fn run_write<W, WFut, L, LFut>(
        &self,
        operation: &'static str,
        mut write: W,
        landed: L,
    ) -> Result<bool, CoreError>
    where
        W: FnMut() -> WFut,
        WFut: Future<Output = Result<bool, StoreError>>,
        L: FnOnce() -> LFut,
        LFut: Future<Output = Result<bool, StoreError>>,
    {
        match write().await {
            Ok(swapped) => Ok(swapped),
            Err(StoreError::Transient(msg)) => {
                tracing::warn!(
                    operation,
                    error = %msg,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "Transient error on conditional write, checking stored state"
                );
                tokio::time::sleep(self.backoff).await;
                match landed().await {
                    Ok(true) => {
                        tracing::info!(operation, "Conditional write had committed");
                        Ok(true)
                    }
                    Ok(false) => write().await.map_err(|e| {
                        tracing::error!(operation, error = %e, "Store call failed after retry");
                        into_core(e)
                    }),
                    Err(e) => {
                        tracing::error!(operation, error = %e, "Could not verify conditional write");
                        Err(into_core(e))
                    }
                }
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "Store call failed");
                Err(into_core(e))
            }
        }
    }
}

fn into_core(err: StoreError) -> CoreError {
    match err {
        StoreError::Transient(msg) => CoreError::TransientStore(msg),
        StoreError::Backend(msg) => CoreError::Internal(msg),
    }
}
