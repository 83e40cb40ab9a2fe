// src/upstream/sim.rs
// Scripted provider used by dispatcher/gateway/graph tests in place of the
// real rawaddr endpoint.
use super::{AddressSource, FetchRequest};
use crate::error::ExplorerError;
use crate::types::{AddressSnapshot, ChainTransaction, TxInput, TxOutput};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub(crate) struct ScriptedSource {
    responses: Mutex<VecDeque<Result<AddressSnapshot, ExplorerError>>>,
    calls: Mutex<Vec<(FetchRequest, Instant)>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub(crate) fn new(responses: Vec<Result<AddressSnapshot, ExplorerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Each call sleeps before answering, to hold a fetch in flight.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) async fn calls(&self) -> Vec<(FetchRequest, Instant)> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl AddressSource for ScriptedSource {
    async fn raw_address(&self, request: &FetchRequest) -> Result<AddressSnapshot, ExplorerError> {
        self.calls
            .lock()
            .await
            .push((request.clone(), Instant::now()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Err(ExplorerError::UpstreamUnavailable(
                    "script exhausted".to_string(),
                ))
            })
    }
}

pub(crate) fn snapshot(
    address: &str,
    n_tx: u64,
    txs: Vec<ChainTransaction>,
) -> AddressSnapshot {
    AddressSnapshot {
        address: address.to_string(),
        n_tx,
        total_received: 5_000,
        total_sent: 2_000,
        final_balance: 3_000,
        txs,
    }
}

/// Build a transaction with `(address, value)` input and output legs.
pub(crate) fn tx(
    hash: &str,
    time: i64,
    inputs: Vec<(&str, u64)>,
    outputs: Vec<(&str, u64)>,
) -> ChainTransaction {
    ChainTransaction {
        hash: hash.to_string(),
        time: Some(time),
        inputs: inputs
            .into_iter()
            .map(|(addr, value)| TxInput {
                prev_out: Some(TxOutput {
                    addr: Some(addr.to_string()),
                    value,
                }),
            })
            .collect(),
        out: outputs
            .into_iter()
            .map(|(addr, value)| TxOutput {
                addr: Some(addr.to_string()),
                value,
            })
            .collect(),
    }
}
