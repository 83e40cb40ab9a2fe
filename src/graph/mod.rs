// src/graph/mod.rs
pub mod manager;

pub use manager::{ExpandOutcome, GraphManager};

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Transient fetch sub-state, tracked on the node itself so a node can be
/// simultaneously expanded and currently loading more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    InFlight,
}

/// One address in the accumulated graph. Exactly one node per address.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub display_label: String,
    pub balance: Option<u64>,
    pub total_received: Option<u64>,
    pub total_sent: Option<u64>,
    pub transaction_count: Option<u64>,
    pub expanded: bool,
    pub level: u32,
    pub loaded_transactions: u64,
    pub current_offset: u64,
    pub has_more_transactions: bool,
    #[serde(skip)]
    pub(crate) phase: FetchPhase,
}

impl GraphNode {
    /// A first-sighting node: participant of someone else's transaction,
    /// pagination cursor zeroed, nothing fetched for it yet.
    pub fn placeholder(address: &str, level: u32) -> Self {
        Self {
            id: address.to_string(),
            display_label: short_label(address),
            balance: None,
            total_received: None,
            total_sent: None,
            transaction_count: None,
            expanded: false,
            level,
            loaded_transactions: 0,
            current_offset: 0,
            has_more_transactions: false,
            phase: FetchPhase::Idle,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == FetchPhase::InFlight
    }
}

fn short_label(address: &str) -> String {
    if address.len() <= 12 {
        address.to_string()
    } else {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    }
}

/// Directed value flow for one transaction between two addresses. The
/// (source, target, tx_hash) triple is unique in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub tx_hash: String,
    pub value: u64,
    pub timestamp: Option<i64>,
}

/// Serializable copy of the accumulated graph for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// The accumulated graph. Only the `GraphManager` writes to it.
#[derive(Debug, Default)]
pub struct GraphState {
    nodes: HashMap<String, GraphNode>,
    links: Vec<GraphLink>,
    link_keys: HashSet<String>,
    pub(crate) last_error: Option<String>,
}

impl GraphState {
    pub fn node(&self, address: &str) -> Option<&GraphNode> {
        self.nodes.get(address)
    }

    pub(crate) fn node_mut(&mut self, address: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(address)
    }

    pub(crate) fn insert_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn remove_node(&mut self, address: &str) {
        self.nodes.remove(address);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains_key(address)
    }

    /// Add a link unless its (source, target, tx_hash) triple already
    /// exists. Returns whether the link was new.
    pub(crate) fn add_link(&mut self, link: GraphLink) -> bool {
        let key = format!("{}->{}:{}", link.source, link.target, link.tx_hash);
        if self.link_keys.contains(&key) {
            return false;
        }
        self.link_keys.insert(key);
        self.links.push(link);
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            links: self.links.clone(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.link_keys.clear();
        self.last_error = None;
    }
}
