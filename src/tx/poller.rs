//! Receipt polling with a bounded attempt budget

use crate::chain::LedgerClient;
use crate::config::PollingConfig;
use crate::error::{TxManagerError, TxResult};

use ethers::types::{TransactionReceipt, H256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Per-call polling progress
struct PollState {
    tx_hash: H256,
    attempts_made: u32,
    started: Instant,
}

impl PollState {
    fn new(tx_hash: H256) -> Self {
        Self {
            tx_hash,
            attempts_made: 0,
            started: Instant::now(),
        }
    }

    fn cancelled(&self) -> TxManagerError {
        warn!(
            "Stopped waiting for receipt of {:?} after {} attempts",
            self.tx_hash, self.attempts_made
        );
        TxManagerError::Cancelled {
            tx_hash: self.tx_hash,
            attempts: self.attempts_made,
        }
    }
}

/// Waits for a transaction receipt by querying the node at a fixed interval.
///
/// A missing receipt is retried until `max_attempts` queries have been made;
/// a failed query aborts immediately.
pub struct ReceiptPoller {
    client: Arc<dyn LedgerClient>,
    config: PollingConfig,
}

impl ReceiptPoller {
    pub fn new(client: Arc<dyn LedgerClient>, mut config: PollingConfig) -> Self {
        // At least one query is always made
        config.max_attempts = config.max_attempts.max(1);
        Self { client, config }
    }

    pub fn with_defaults(client: Arc<dyn LedgerClient>) -> Self {
        Self::new(client, PollingConfig::default())
    }

    pub fn config(&self) -> PollingConfig {
        self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.client.chain_id()
    }

    /// Poll until the receipt appears or the attempt budget is spent
    pub async fn wait_for_receipt(&self, tx_hash: H256) -> TxResult<TransactionReceipt> {
        self.wait_for_receipt_until(tx_hash, std::future::pending::<()>())
            .await
    }

    /// Like `wait_for_receipt`, but gives up as soon as `cancel` completes
    pub async fn wait_for_receipt_until<F>(
        &self,
        tx_hash: H256,
        cancel: F,
    ) -> TxResult<TransactionReceipt>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let chain_id = self.client.chain_id();
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut state = PollState::new(tx_hash);

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut cancel => return Err(state.cancelled()),
                result = self.client.get_transaction_receipt(tx_hash) => result,
            };
            state.attempts_made += 1;
            crate::metrics::record_receipt_query(chain_id);

            match result {
                Ok(Some(receipt)) => {
                    let elapsed = state.started.elapsed();
                    info!(
                        "Transaction {:?} included in block {:?} after {} attempts ({}ms)",
                        tx_hash,
                        receipt.block_number,
                        state.attempts_made,
                        elapsed.as_millis()
                    );
                    crate::metrics::record_tx_confirmed(chain_id);
                    crate::metrics::record_tx_latency(chain_id, elapsed.as_secs_f64());
                    return Ok(receipt);
                }
                Ok(None) => {
                    debug!(
                        "Receipt for {:?} not available (attempt {}/{})",
                        tx_hash, state.attempts_made, self.config.max_attempts
                    );
                }
                Err(e) => {
                    error!(
                        "Receipt query for {:?} failed on attempt {}: {}",
                        tx_hash, state.attempts_made, e
                    );
                    crate::metrics::record_query_failure(chain_id);
                    return Err(TxManagerError::Query {
                        tx_hash,
                        attempt: state.attempts_made,
                        message: e.to_string(),
                    });
                }
            }

            if state.attempts_made >= self.config.max_attempts {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut cancel => return Err(state.cancelled()),
                _ = sleep(interval) => {}
            }
        }

        warn!(
            "No receipt for {:?} after {} attempts",
            tx_hash, state.attempts_made
        );
        crate::metrics::record_tx_timeout(chain_id);
        Err(TxManagerError::Timeout {
            tx_hash,
            attempts: state.attempts_made,
        })
    }
}
