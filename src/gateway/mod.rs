// src/gateway/mod.rs
use crate::cache::{SnapshotCache, SnapshotKey};
use crate::error::ExplorerError;
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::types::{AddressSnapshot, ExplorerConfig};
use crate::upstream::{AddressSource, FetchRequest, ThrottledDispatcher};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Gateway response with cache provenance.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub snapshot: AddressSnapshot,
    pub served_from_cache: bool,
    pub cache_timestamp: DateTime<Utc>,
}

/// Orchestrates one inbound fetch: validate, consult the rate limiter,
/// consult the cache, and only then spend upstream budget through the
/// dispatcher. The cache is populated strictly after a successful fetch;
/// errors are never cached.
pub struct UpstreamGateway {
    cache: Arc<RwLock<SnapshotCache>>,
    limiter: RateLimiter,
    dispatcher: ThrottledDispatcher,
}

impl UpstreamGateway {
    pub fn new(source: Arc<dyn AddressSource>, config: &ExplorerConfig) -> Self {
        Self {
            cache: Arc::new(RwLock::new(SnapshotCache::new(config.cache.ttl_ms))),
            limiter: RateLimiter::new(&config.rate_limit),
            dispatcher: ThrottledDispatcher::new(source, &config.upstream),
        }
    }

    pub async fn fetch(
        &self,
        address: &str,
        limit: u32,
        offset: u64,
        client_key: &str,
    ) -> Result<GatewayResponse, ExplorerError> {
        let address = address.trim();
        if address.is_empty() {
            // Validation failures carry no rate-limit or cache cost.
            return Err(ExplorerError::MissingAddress);
        }

        match self.limiter.check(client_key).await {
            RateDecision::Allowed { .. } => {}
            RateDecision::Rejected {
                retry_after_seconds,
                limit,
                reset_at,
            } => {
                warn!(
                    client = client_key,
                    retry_after_seconds, "inbound rate limit exceeded"
                );
                return Err(ExplorerError::ClientRateLimited {
                    retry_after_seconds,
                    limit,
                    reset_at,
                });
            }
        }

        let key = SnapshotKey {
            address: address.to_string(),
            limit,
            offset,
        };
        {
            let mut cache = self.cache.write().await;
            if let Some(cached) = cache.get(&key) {
                debug!(address, limit, offset, "serving snapshot from cache");
                return Ok(GatewayResponse {
                    snapshot: cached.snapshot,
                    served_from_cache: true,
                    cache_timestamp: cached.fetched_at,
                });
            }
        }

        debug!(address, limit, offset, "cache miss, dispatching upstream fetch");
        let snapshot = self
            .dispatcher
            .execute(FetchRequest {
                address: address.to_string(),
                limit,
                offset,
            })
            .await?;

        let mut cache = self.cache.write().await;
        let cache_timestamp = cache.insert(key, snapshot.clone());

        Ok(GatewayResponse {
            snapshot,
            served_from_cache: false,
            cache_timestamp,
        })
    }

    /// Periodic maintenance: evict expired cache entries and reclaim idle
    /// rate windows.
    pub async fn sweep(&self) {
        self.cache.write().await.clear_expired();
        self.limiter.reclaim_stale().await;
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.limiter.tracked_clients().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RateLimitConfig;
    use crate::upstream::sim::{snapshot, ScriptedSource};

    fn test_config() -> ExplorerConfig {
        let mut config = ExplorerConfig::default();
        config.upstream.min_spacing_ms = 0;
        config.upstream.max_retry_attempts = 1;
        config
    }

    #[tokio::test]
    async fn test_missing_address_charges_nothing() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot("a", 0, vec![]))]));
        let mut config = test_config();
        config.rate_limit = RateLimitConfig {
            max_requests: 1,
            window_ms: 60_000,
            reclaim_after_windows: 2,
        };
        let gateway = UpstreamGateway::new(source.clone(), &config);

        assert!(matches!(
            gateway.fetch("  ", 10, 0, "client").await,
            Err(ExplorerError::MissingAddress)
        ));
        assert_eq!(source.call_count().await, 0);

        // The rejected-for-validation call did not consume the 1-request budget.
        assert!(gateway.fetch("1A1zP1eP5Q", 10, 0, "client").await.is_ok());
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot("addr1", 3, vec![]))]));
        let gateway = UpstreamGateway::new(source.clone(), &test_config());

        let first = gateway.fetch("addr1", 10, 0, "client").await.unwrap();
        let second = gateway.fetch("addr1", 10, 0, "client").await.unwrap();

        assert!(!first.served_from_cache);
        assert!(second.served_from_cache);
        assert_eq!(second.cache_timestamp, first.cache_timestamp);
        assert_eq!(source.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_pages_miss_independently() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(snapshot("addr1", 30, vec![])),
            Ok(snapshot("addr1", 30, vec![])),
        ]));
        let gateway = UpstreamGateway::new(source.clone(), &test_config());

        gateway.fetch("addr1", 10, 0, "client").await.unwrap();
        gateway.fetch("addr1", 10, 10, "client").await.unwrap();

        assert_eq!(source.call_count().await, 2);
        assert_eq!(gateway.cache_len().await, 2);
    }

    #[tokio::test]
    async fn test_rate_limited_client_fails_fast() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot("addr1", 0, vec![]))]));
        let mut config = test_config();
        config.rate_limit.max_requests = 1;
        let gateway = UpstreamGateway::new(source.clone(), &config);

        gateway.fetch("addr1", 10, 0, "client").await.unwrap();
        let rejected = gateway.fetch("addr1", 10, 0, "client").await;

        match rejected {
            Err(ExplorerError::ClientRateLimited {
                retry_after_seconds,
                limit,
                ..
            }) => {
                assert!(retry_after_seconds > 0);
                assert_eq!(limit, 1);
            }
            other => panic!("expected rate limit rejection, got {:?}", other),
        }
        // No extra upstream work, even though the result was already cached.
        assert_eq!(source.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(ExplorerError::UpstreamUnavailable("503".to_string())),
            Ok(snapshot("addr1", 4, vec![])),
        ]));
        let gateway = UpstreamGateway::new(source.clone(), &test_config());

        assert!(gateway.fetch("addr1", 10, 0, "client").await.is_err());
        assert_eq!(gateway.cache_len().await, 0);

        let second = gateway.fetch("addr1", 10, 0, "client").await.unwrap();
        assert!(!second.served_from_cache);
        assert_eq!(second.snapshot.n_tx, 4);
        assert_eq!(source.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_cache_and_windows() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot("addr1", 0, vec![]))]));
        let mut config = test_config();
        config.cache.ttl_ms = 20;
        config.rate_limit.window_ms = 20;
        config.rate_limit.reclaim_after_windows = 1;
        let gateway = UpstreamGateway::new(source, &config);

        gateway.fetch("addr1", 10, 0, "client").await.unwrap();
        assert_eq!(gateway.cache_len().await, 1);
        assert_eq!(gateway.tracked_clients().await, 1);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gateway.sweep().await;

        assert_eq!(gateway.cache_len().await, 0);
        assert_eq!(gateway.tracked_clients().await, 0);
    }
}
