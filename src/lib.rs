// src/lib.rs
pub mod api;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod ratelimit;
pub mod types;
pub mod upstream;

pub use error::{ExplorerError, ExplorerResult};
pub use types::ExplorerConfig;

use crate::gateway::UpstreamGateway;
use crate::graph::{ExpandOutcome, GraphManager, GraphNode, GraphSnapshot};
use crate::upstream::{AddressSource, BlockchainClient};
use std::sync::Arc;
use std::time::Duration;

/// Top-level explorer: one gateway to the upstream provider plus the
/// accumulated money-flow graph built from its responses.
#[derive(Clone)]
pub struct ChainExplorer {
    config: ExplorerConfig,
    gateway: Arc<UpstreamGateway>,
    graph: GraphManager,
}

impl ChainExplorer {
    /// Create an explorer backed by the real provider endpoint.
    pub fn new(config: ExplorerConfig) -> Result<Self, ExplorerError> {
        let source = Arc::new(BlockchainClient::new(&config.upstream)?);
        Ok(Self::with_source(config, source))
    }

    /// Create an explorer over any address source. Used by tests and by
    /// embedders that bring their own provider client.
    pub fn with_source(config: ExplorerConfig, source: Arc<dyn AddressSource>) -> Self {
        let gateway = Arc::new(UpstreamGateway::new(source, &config));
        let graph = GraphManager::new(Arc::clone(&gateway), config.graph.clone(), "local");

        Self {
            config,
            gateway,
            graph,
        }
    }

    /// The gateway, for wiring into the HTTP surface.
    pub fn gateway(&self) -> Arc<UpstreamGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn graph(&self) -> &GraphManager {
        &self.graph
    }

    /// Start exploring from a root address.
    pub async fn load_initial(&self, address: &str) -> Result<ExpandOutcome, ExplorerError> {
        self.graph.load_initial(address).await
    }

    /// Expand a node already in the graph.
    pub async fn expand(
        &self,
        address: &str,
        current_level: u32,
    ) -> Result<ExpandOutcome, ExplorerError> {
        self.graph.expand(address, current_level).await
    }

    /// Fetch the next transaction page for a node.
    pub async fn load_more(&self, address: &str) -> Result<ExpandOutcome, ExplorerError> {
        self.graph.load_more(address).await
    }

    pub async fn graph_snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot().await
    }

    pub async fn graph_node(&self, address: &str) -> Option<GraphNode> {
        self.graph.node(address).await
    }

    pub async fn reset_graph(&self) {
        self.graph.reset().await
    }

    /// Spawn the periodic maintenance task: cache sweep plus stale rate
    /// window reclamation.
    pub fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let interval = Duration::from_millis(self.config.cache.sweep_interval_ms);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                gateway.sweep().await;
            }
        })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<(), ExplorerError> {
        reqwest::Url::parse(&self.config.upstream.base_url).map_err(|e| {
            ExplorerError::HealthCheck(format!("invalid upstream base URL: {}", e))
        })?;

        if self.gateway.cache_len().await > 100_000 {
            return Err(ExplorerError::HealthCheck("cache too large".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::sim::{snapshot, tx, ScriptedSource};

    const ROOT: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn test_config() -> ExplorerConfig {
        let mut config = ExplorerConfig::default();
        config.upstream.min_spacing_ms = 0;
        config.upstream.max_retry_attempts = 1;
        config.rate_limit.max_requests = 100;
        config
    }

    #[tokio::test]
    async fn test_end_to_end_exploration() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(snapshot(
                ROOT,
                1,
                vec![tx("tx1", 1_700_000_000, vec![("exchangehotwallet1", 80)], vec![(ROOT, 80)])],
            )),
            Ok(snapshot(
                "exchangehotwallet1",
                1,
                vec![tx("tx2", 1_700_000_200, vec![("coldstorage9", 500)], vec![("exchangehotwallet1", 500)])],
            )),
        ]));
        let explorer = ChainExplorer::with_source(test_config(), source);

        explorer.load_initial(ROOT).await.unwrap();
        explorer.expand("exchangehotwallet1", 1).await.unwrap();

        let graph = explorer.graph_snapshot().await;
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.links.len(), 2);

        let root = explorer.graph_node(ROOT).await.unwrap();
        assert_eq!(root.level, 0);
        let hot = explorer.graph_node("exchangehotwallet1").await.unwrap();
        assert_eq!(hot.level, 1);
        assert!(hot.expanded);
        let cold = explorer.graph_node("coldstorage9").await.unwrap();
        assert_eq!(cold.level, 2);
        assert!(!cold.expanded);

        explorer.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_serves_graph_refetch_from_cache() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot(ROOT, 0, vec![]))]));
        let explorer = ChainExplorer::with_source(test_config(), source.clone());

        explorer.load_initial(ROOT).await.unwrap();
        // Reset the graph and explore the same root again: the upstream
        // budget is spent once, the second page comes from the cache.
        explorer.reset_graph().await;
        explorer.load_initial(ROOT).await.unwrap();

        assert_eq!(source.call_count().await, 1);
        assert_eq!(explorer.graph_snapshot().await.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_health_check_rejects_bad_base_url() {
        let mut config = test_config();
        config.upstream.base_url = "not a url".to_string();
        let source = Arc::new(ScriptedSource::new(vec![]));
        let explorer = ChainExplorer::with_source(config, source);

        assert!(matches!(
            explorer.health_check().await,
            Err(ExplorerError::HealthCheck(_))
        ));
    }
}
