//! Submit-then-confirm orchestration

use super::identity::SigningIdentity;
use super::poller::ReceiptPoller;
use super::submitter::TransactionSubmitter;
use super::{PendingTransaction, TxRequest};
use crate::chain::LedgerClient;
use crate::config::PollingConfig;
use crate::error::{TxManagerError, TxResult};

use ethers::types::{Address, TransactionReceipt};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Executes transactions for one signing identity.
///
/// Each `execute` makes exactly one submission call and, when the node
/// accepts the transaction, polls for its receipt. Submission is never
/// retried.
pub struct TransactionManager {
    submitter: Arc<dyn TransactionSubmitter>,
    identity: Arc<dyn SigningIdentity>,
    poller: ReceiptPoller,
}

impl TransactionManager {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        identity: Arc<dyn SigningIdentity>,
        poller: ReceiptPoller,
    ) -> Self {
        Self {
            submitter,
            identity,
            poller,
        }
    }

    /// Manager with the default polling budget
    pub fn with_defaults(
        submitter: Arc<dyn TransactionSubmitter>,
        identity: Arc<dyn SigningIdentity>,
        client: Arc<dyn LedgerClient>,
    ) -> Self {
        Self::new(submitter, identity, ReceiptPoller::with_defaults(client))
    }

    /// Manager polling `attempts` times, `poll_interval_ms` apart
    pub fn with_polling(
        submitter: Arc<dyn TransactionSubmitter>,
        identity: Arc<dyn SigningIdentity>,
        client: Arc<dyn LedgerClient>,
        attempts: u32,
        poll_interval_ms: u64,
    ) -> Self {
        let config = PollingConfig {
            poll_interval_ms,
            max_attempts: attempts,
        };
        Self::new(submitter, identity, ReceiptPoller::new(client, config))
    }

    /// Sender address of the held identity
    pub fn get_from_address(&self) -> Address {
        self.identity.address()
    }

    pub fn poller(&self) -> &ReceiptPoller {
        &self.poller
    }

    /// Submit through the configured strategy without waiting for inclusion
    pub async fn submit(&self, request: &TxRequest) -> TxResult<PendingTransaction> {
        self.submitter.submit(request).await
    }

    /// Submit a transaction and wait for its receipt
    pub async fn execute(&self, request: &TxRequest) -> TxResult<TransactionReceipt> {
        self.execute_until(request, std::future::pending::<()>())
            .await
    }

    /// Like `execute`, but stops waiting for the receipt once `cancel`
    /// completes. The submission call itself is not interrupted.
    pub async fn execute_until<F>(
        &self,
        request: &TxRequest,
        cancel: F,
    ) -> TxResult<TransactionReceipt>
    where
        F: Future<Output = ()>,
    {
        let span = info_span!(
            "execute",
            execution_id = %Uuid::new_v4(),
            from = ?self.get_from_address(),
        );

        async move {
            let chain_id = self.poller.chain_id();
            let pending = self.submit(request).await?;

            let tx_hash = match pending {
                PendingTransaction::Submitted { tx_hash } => tx_hash,
                PendingTransaction::Rejected { code, message } => {
                    warn!("Transaction rejected by node: {} (code {})", message, code);
                    crate::metrics::record_tx_rejected(chain_id);
                    return Err(TxManagerError::Submission { code, message });
                }
            };

            info!("Transaction {:?} submitted, waiting for receipt", tx_hash);
            crate::metrics::record_tx_submitted(chain_id);

            self.poller.wait_for_receipt_until(tx_hash, cancel).await
        }
        .instrument(span)
        .await
    }
}
