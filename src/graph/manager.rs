// src/graph/manager.rs
use super::{FetchPhase, GraphLink, GraphNode, GraphSnapshot, GraphState};
use crate::error::ExplorerError;
use crate::gateway::UpstreamGateway;
use crate::types::{AddressSnapshot, GraphConfig};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Observable result of an expansion request. Guard skips are outcomes,
/// not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandOutcome {
    Merged {
        address: String,
        new_nodes: usize,
        new_links: usize,
        has_more: bool,
    },
    /// A fetch for this address is already in flight.
    SkippedInFlight,
    /// `load_more` on an address the graph has never seen.
    SkippedUnknown,
    /// `load_more` on a node whose transaction history is fully loaded.
    SkippedComplete,
}

/// Turns gateway responses into accumulated graph state: one node per
/// address, deduplicated links, a pagination cursor per node, and a
/// per-address guard against concurrent fetches. The only writer to the
/// graph.
#[derive(Clone)]
pub struct GraphManager {
    gateway: Arc<UpstreamGateway>,
    state: Arc<RwLock<GraphState>>,
    config: GraphConfig,
    client_key: String,
}

impl GraphManager {
    pub fn new(
        gateway: Arc<UpstreamGateway>,
        config: GraphConfig,
        client_key: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(GraphState::default())),
            config,
            client_key: client_key.into(),
        }
    }

    /// Start a fresh exploration from a root address at level 0.
    pub async fn load_initial(&self, address: &str) -> Result<ExpandOutcome, ExplorerError> {
        let address = address.trim();
        let len = address.len();
        if len < self.config.min_address_len || len > self.config.max_address_len {
            return Err(ExplorerError::InvalidAddress(format!(
                "address length {} outside {}..={}",
                len, self.config.min_address_len, self.config.max_address_len
            )));
        }
        self.expand(address, 0).await
    }

    /// Fetch the first page for `address` and merge its participants and
    /// value flows into the graph. A no-op while a fetch for the same
    /// address is outstanding.
    pub async fn expand(
        &self,
        address: &str,
        current_level: u32,
    ) -> Result<ExpandOutcome, ExplorerError> {
        let address = address.trim().to_string();

        let created = {
            let mut state = self.state.write().await;
            match state.node_mut(&address) {
                Some(node) => {
                    if node.is_in_flight() {
                        return Ok(ExpandOutcome::SkippedInFlight);
                    }
                    node.phase = FetchPhase::InFlight;
                    false
                }
                None => {
                    let mut node = GraphNode::placeholder(&address, current_level);
                    node.phase = FetchPhase::InFlight;
                    state.insert_node(node);
                    true
                }
            }
        };

        self.fetch_and_merge(&address, current_level, 0, false, created)
            .await
    }

    /// Fetch the next page for an already-explored node, appending to its
    /// transaction history.
    pub async fn load_more(&self, address: &str) -> Result<ExpandOutcome, ExplorerError> {
        let address = address.trim().to_string();

        let (offset, level) = {
            let mut state = self.state.write().await;
            match state.node_mut(&address) {
                None => return Ok(ExpandOutcome::SkippedUnknown),
                Some(node) => {
                    if node.is_in_flight() {
                        return Ok(ExpandOutcome::SkippedInFlight);
                    }
                    if !node.has_more_transactions {
                        return Ok(ExpandOutcome::SkippedComplete);
                    }
                    node.phase = FetchPhase::InFlight;
                    (node.current_offset, node.level)
                }
            }
        };

        self.fetch_and_merge(&address, level, offset, true, false)
            .await
    }

    async fn fetch_and_merge(
        &self,
        address: &str,
        base_level: u32,
        offset: u64,
        append: bool,
        created_placeholder: bool,
    ) -> Result<ExpandOutcome, ExplorerError> {
        let fetched = self
            .gateway
            .fetch(address, self.config.page_size, offset, &self.client_key)
            .await;

        match fetched {
            Ok(response) => {
                let mut state = self.state.write().await;
                let (new_nodes, new_links) =
                    merge_snapshot(&mut state, address, base_level, &response.snapshot, append);

                let mut has_more = false;
                if let Some(node) = state.node_mut(address) {
                    node.phase = FetchPhase::Idle;
                    node.expanded = true;
                    has_more = node.has_more_transactions;
                }
                state.last_error = None;

                info!(
                    address,
                    new_nodes, new_links, has_more, "merged upstream page into graph"
                );
                Ok(ExpandOutcome::Merged {
                    address: address.to_string(),
                    new_nodes,
                    new_links,
                    has_more,
                })
            }
            Err(err) => {
                let mut state = self.state.write().await;
                if created_placeholder {
                    // The node existed only to carry the in-flight mark.
                    state.remove_node(address);
                } else if let Some(node) = state.node_mut(address) {
                    node.phase = FetchPhase::Idle;
                }
                state.last_error = Some(err.to_string());

                warn!(address, error = %err, "expansion fetch failed, graph unchanged");
                Err(err)
            }
        }
    }

    pub async fn snapshot(&self) -> GraphSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn node(&self, address: &str) -> Option<GraphNode> {
        self.state.read().await.node(address).cloned()
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.node_count()
    }

    pub async fn link_count(&self) -> usize {
        self.state.read().await.link_count()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Throw away the accumulated graph and start over.
    pub async fn reset(&self) {
        self.state.write().await.clear();
    }
}

/// Fold one fetched page into the graph. The target's own stats and cursor
/// are updated; every counterpart address gets a node one level out (first
/// sighting only) and a directed link per transaction leg, deduplicated on
/// (source, target, tx_hash).
fn merge_snapshot(
    state: &mut GraphState,
    target: &str,
    base_level: u32,
    snapshot: &AddressSnapshot,
    append: bool,
) -> (usize, usize) {
    let page_len = snapshot.txs.len() as u64;

    if let Some(node) = state.node_mut(target) {
        node.balance = Some(snapshot.final_balance);
        node.total_received = Some(snapshot.total_received);
        node.total_sent = Some(snapshot.total_sent);
        node.transaction_count = Some(snapshot.n_tx);
        if append {
            node.loaded_transactions += page_len;
            node.current_offset += page_len;
        } else {
            node.loaded_transactions = page_len;
            node.current_offset = page_len;
        }
        node.has_more_transactions = node.current_offset < snapshot.n_tx;
    }

    let counterpart_level = base_level + 1;
    let mut new_nodes = 0;
    let mut new_links = 0;

    for tx in &snapshot.txs {
        for input in &tx.inputs {
            if let Some(prev) = &input.prev_out {
                if let Some(addr) = &prev.addr {
                    if addr != target {
                        if !state.contains(addr) {
                            state.insert_node(GraphNode::placeholder(addr, counterpart_level));
                            new_nodes += 1;
                        }
                        // Inputs flow from the counterpart into the target.
                        if state.add_link(GraphLink {
                            source: addr.clone(),
                            target: target.to_string(),
                            tx_hash: tx.hash.clone(),
                            value: prev.value,
                            timestamp: tx.time,
                        }) {
                            new_links += 1;
                        }
                    }
                }
            }
        }
        for out in &tx.out {
            if let Some(addr) = &out.addr {
                if addr != target {
                    if !state.contains(addr) {
                        state.insert_node(GraphNode::placeholder(addr, counterpart_level));
                        new_nodes += 1;
                    }
                    if state.add_link(GraphLink {
                        source: target.to_string(),
                        target: addr.clone(),
                        tx_hash: tx.hash.clone(),
                        value: out.value,
                        timestamp: tx.time,
                    }) {
                        new_links += 1;
                    }
                }
            }
        }
    }

    (new_nodes, new_links)
}
