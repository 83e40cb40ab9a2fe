// src/upstream/mod.rs
pub mod dispatcher;
#[cfg(test)]
pub(crate) mod sim;

pub use dispatcher::ThrottledDispatcher;

use crate::error::ExplorerError;
use crate::types::{AddressSnapshot, UpstreamConfig};
use async_trait::async_trait;

/// One upstream page fetch: (address, limit, offset).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub address: String,
    pub limit: u32,
    pub offset: u64,
}

/// Seam between the dispatcher and the concrete provider client, so tests
/// can script upstream behavior without a network.
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn raw_address(&self, request: &FetchRequest) -> Result<AddressSnapshot, ExplorerError>;
}

/// HTTP client for the public ledger provider's rawaddr endpoint.
pub struct BlockchainClient {
    http: reqwest::Client,
    base_url: String,
}

impl BlockchainClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ExplorerError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                ExplorerError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AddressSource for BlockchainClient {
    async fn raw_address(&self, request: &FetchRequest) -> Result<AddressSnapshot, ExplorerError> {
        let url = format!(
            "{}/rawaddr/{}?limit={}&offset={}",
            self.base_url, request.address, request.limit, request.offset
        );

        let response = self.http.get(&url).send().await.map_err(|e| {
            ExplorerError::UpstreamUnavailable(format!("Request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ExplorerError::UpstreamRateLimited {
                retry_after_seconds,
            });
        }
        if !status.is_success() {
            return Err(ExplorerError::UpstreamUnavailable(format!(
                "Upstream returned {} for {}",
                status, request.address
            )));
        }

        response
            .json::<AddressSnapshot>()
            .await
            .map_err(|e| ExplorerError::MalformedPayload(e.to_string()))
    }
}
