//! Clients for the external proxy-health collaborator.
//!
//! The collaborator answers `GET {base}/teams/{team_id}/proxy-health` with
//! `{"workingCount": .., "failedCount": .., "averageLatencyMs": ..}`.

use std::time::Duration;

use async_trait::async_trait;
use profilehub_core::health::ProxyHealth;
use profilehub_core::store::{ProxyHealthSource, StoreError};

/// HTTP request timeout for a single proxy-health lookup.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// HttpProxyHealthClient
// ---------------------------------------------------------------------------

pub struct HttpProxyHealthClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProxyHealthClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, team_id: &str) -> String {
        format!("{}/teams/{team_id}/proxy-health", self.base_url)
    }
}

#[async_trait]
impl ProxyHealthSource for HttpProxyHealthClient {
    async fn proxy_health(&self, team_id: &str) -> Result<ProxyHealth, StoreError> {
        let url = self.url_for(team_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::Transient(format!(
                "proxy-health returned HTTP {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(StoreError::Backend(format!(
                "proxy-health returned HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<ProxyHealth>()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid proxy-health payload: {e}")))
    }
}

fn classify_request_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() || err.is_connect() {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// UnknownProxyHealth
// ---------------------------------------------------------------------------

/// Used when no collaborator is configured: every team reads as having no
/// proxies, which scores as fully reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownProxyHealth;

#[async_trait]
impl ProxyHealthSource for UnknownProxyHealth {
    async fn proxy_health(&self, _team_id: &str) -> Result<ProxyHealth, StoreError> {
        Ok(ProxyHealth::default())
    }
}
