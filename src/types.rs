// src/types.rs
use serde::{Deserialize, Serialize};

/// Normalized upstream payload for one (address, limit, offset) page.
/// Immutable once fetched; cached as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub address: String,
    pub n_tx: u64,
    pub total_received: u64,
    pub total_sent: u64,
    pub final_balance: u64,
    #[serde(default)]
    pub txs: Vec<ChainTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub hash: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub out: Vec<TxOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub prev_out: Option<TxOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ExplorerConfig {
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub graph: GraphConfig,
}

/// Upstream provider endpoint plus the dispatcher's pacing and retry knobs.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Minimum gap between the starts of two successive upstream calls.
    pub min_spacing_ms: u64,
    pub max_retry_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blockchain.info".to_string(),
            request_timeout_ms: 30_000,
            min_spacing_ms: 1_000,
            max_retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 60_000, // 1 min
            sweep_interval_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
    /// Windows idle for this many window lengths are reclaimed by the sweeper.
    pub reclaim_after_windows: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_ms: 60_000,
            reclaim_after_windows: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Transactions fetched per page when expanding a node.
    pub page_size: u32,
    pub min_address_len: usize,
    pub max_address_len: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            min_address_len: 26,
            max_address_len: 64,
        }
    }
}
