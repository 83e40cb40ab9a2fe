// src/upstream/dispatcher.rs
use super::{AddressSource, FetchRequest};
use crate::error::ExplorerError;
use crate::types::{AddressSnapshot, UpstreamConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

struct QueuedFetch {
    request: FetchRequest,
    reply: oneshot::Sender<Result<AddressSnapshot, ExplorerError>>,
}

/// Serializes upstream calls process-wide: a single worker drains a FIFO
/// queue, spacing call starts by at least `min_spacing_ms` and retrying each
/// call on its own budget. One caller's exhausted retries never stall the
/// entries behind it.
#[derive(Clone)]
pub struct ThrottledDispatcher {
    queue: mpsc::UnboundedSender<QueuedFetch>,
}

impl ThrottledDispatcher {
    pub fn new(source: Arc<dyn AddressSource>, config: &UpstreamConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            source,
            min_spacing: Duration::from_millis(config.min_spacing_ms),
            max_attempts: config.max_retry_attempts.max(1),
        };
        tokio::spawn(worker.run(rx));

        Self { queue: tx }
    }

    /// Enqueue a fetch and wait for its turn to complete. Suspends while the
    /// queue, inter-call spacing, or retry backoff are in front of it.
    pub async fn execute(
        &self,
        request: FetchRequest,
    ) -> Result<AddressSnapshot, ExplorerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(QueuedFetch {
                request,
                reply: reply_tx,
            })
            .map_err(|_| ExplorerError::DispatcherClosed("queue worker stopped".to_string()))?;

        reply_rx
            .await
            .map_err(|_| ExplorerError::DispatcherClosed("queue worker dropped request".to_string()))?
    }
}

struct Worker {
    source: Arc<dyn AddressSource>,
    min_spacing: Duration,
    max_attempts: u32,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueuedFetch>) {
        let mut last_started: Option<Instant> = None;

        while let Some(job) = rx.recv().await {
            if let Some(started) = last_started {
                let since = started.elapsed();
                if since < self.min_spacing {
                    tokio::time::sleep(self.min_spacing - since).await;
                }
            }
            last_started = Some(Instant::now());

            let result = self.attempt(&job.request).await;
            // The caller may have gone away; the queue moves on either way.
            let _ = job.reply.send(result);
        }
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<AddressSnapshot, ExplorerError> {
        let mut attempt = 0u32;

        loop {
            match self.source.raw_address(request).await {
                Ok(snapshot) => {
                    if attempt > 0 {
                        debug!(
                            address = %request.address,
                            attempt, "upstream fetch succeeded after retry"
                        );
                    }
                    return Ok(snapshot);
                }
                Err(err) => {
                    attempt += 1;

                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt >= self.max_attempts {
                        warn!(
                            address = %request.address,
                            attempts = attempt, "upstream retries exhausted: {}", err
                        );
                        // A rate-limited provider keeps its own flavor so the
                        // API can answer 429 instead of 500.
                        if matches!(err, ExplorerError::UpstreamRateLimited { .. }) {
                            return Err(err);
                        }
                        return Err(ExplorerError::RetriesExhausted {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }

                    let delay = match &err {
                        ExplorerError::UpstreamRateLimited {
                            retry_after_seconds: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => Duration::from_secs(2u64.saturating_pow(attempt)),
                    };
                    debug!(
                        address = %request.address,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying upstream fetch: {}", err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
