//! Submission strategies

use super::identity::SigningIdentity;
use super::nonce::NonceManager;
use super::{PendingTransaction, TxRequest};
use crate::chain::{LedgerClient, SubmitResponse};
use crate::error::TxResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a transaction from a request and hands it to the node.
///
/// Exactly one submission RPC call per `submit`. Implementations never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, request: &TxRequest) -> TxResult<PendingTransaction>;
}

impl From<SubmitResponse> for PendingTransaction {
    fn from(response: SubmitResponse) -> Self {
        match response {
            SubmitResponse::Accepted(tx_hash) => PendingTransaction::Submitted { tx_hash },
            SubmitResponse::Rejected { code, message } => {
                PendingTransaction::Rejected { code, message }
            }
        }
    }
}

/// Rejections caused by the nonce itself rather than the transaction
fn is_nonce_conflict(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("nonce too low")
        || message.contains("already known")
        || message.contains("replacement transaction underpriced")
}

/// Legacy transaction carrying the request's fields
fn build_legacy_tx(
    request: &TxRequest,
    from: Address,
    nonce: Option<U256>,
    chain_id: u64,
) -> TypedTransaction {
    let mut tx = TransactionRequest::new()
        .from(from)
        .gas(request.gas_limit)
        .gas_price(request.gas_price)
        .value(request.value)
        .data(request.data.clone())
        .chain_id(chain_id);

    if let Some(to) = request.to {
        tx = tx.to(to);
    }
    if let Some(nonce) = nonce {
        tx = tx.nonce(nonce);
    }

    TypedTransaction::Legacy(tx)
}

/// Signs locally and broadcasts with eth_sendRawTransaction
pub struct RawTransactionSubmitter {
    client: Arc<dyn LedgerClient>,
    identity: Arc<dyn SigningIdentity>,
    nonce_manager: NonceManager,
}

impl RawTransactionSubmitter {
    pub fn new(client: Arc<dyn LedgerClient>, identity: Arc<dyn SigningIdentity>) -> Self {
        let nonce_manager = NonceManager::new(identity.address());
        Self {
            client,
            identity,
            nonce_manager,
        }
    }

    async fn sign_and_send(&self, request: &TxRequest, nonce: U256) -> TxResult<SubmitResponse> {
        let tx = build_legacy_tx(
            request,
            self.identity.address(),
            Some(nonce),
            self.client.chain_id(),
        );

        let signature = self.identity.sign_transaction(&tx).await?;
        let signed = tx.rlp_signed(&signature);

        debug!(
            "Broadcasting raw transaction {:?} with nonce {}",
            tx.sighash(),
            nonce
        );
        self.client.send_raw_transaction(signed).await
    }
}

#[async_trait]
impl TransactionSubmitter for RawTransactionSubmitter {
    async fn submit(&self, request: &TxRequest) -> TxResult<PendingTransaction> {
        let nonce = self.nonce_manager.next_nonce(self.client.as_ref()).await?;

        match self.sign_and_send(request, nonce).await {
            Ok(SubmitResponse::Accepted(tx_hash)) => {
                info!("Transaction sent: {:?} (nonce {})", tx_hash, nonce);
                Ok(PendingTransaction::Submitted { tx_hash })
            }
            Ok(rejected) => {
                warn!("Node rejected transaction with nonce {}: {:?}", nonce, rejected);
                match &rejected {
                    SubmitResponse::Rejected { message, .. } if is_nonce_conflict(message) => {
                        // Local counter is behind the node; refetch on next submit
                        self.nonce_manager.reset().await;
                    }
                    _ => self.nonce_manager.release_nonce(nonce).await,
                }
                Ok(rejected.into())
            }
            Err(e) => {
                // The node may have received it anyway, so never reuse this nonce
                self.nonce_manager.reset().await;
                Err(e)
            }
        }
    }
}

/// Lets the node sign for an account it manages (eth_sendTransaction)
pub struct DelegatedTransactionSubmitter {
    client: Arc<dyn LedgerClient>,
    from: Address,
}

impl DelegatedTransactionSubmitter {
    pub fn new(client: Arc<dyn LedgerClient>, from: Address) -> Self {
        Self { client, from }
    }
}

#[async_trait]
impl TransactionSubmitter for DelegatedTransactionSubmitter {
    async fn submit(&self, request: &TxRequest) -> TxResult<PendingTransaction> {
        // Nonce is assigned by the node
        let tx = build_legacy_tx(request, self.from, None, self.client.chain_id());

        let response = self.client.send_transaction(&tx).await?;
        if let SubmitResponse::Accepted(tx_hash) = &response {
            info!("Transaction sent via node account {:?}: {:?}", self.from, tx_hash);
        }
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockLedgerClient;
    use crate::error::TxManagerError;
    use ethers::signers::LocalWallet;
    use ethers::types::{Bytes, H256};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn wallet() -> Arc<dyn SigningIdentity> {
        Arc::new(KEY.parse::<LocalWallet>().unwrap())
    }

    fn transfer() -> TxRequest {
        TxRequest::new(
            U256::from(1_000_000_000u64),
            U256::from(21_000),
            Some(Address::repeat_byte(0x22)),
            Bytes::default(),
            U256::from(5),
        )
    }

    fn base_client(nonce: u64) -> MockLedgerClient {
        let mut client = MockLedgerClient::new();
        client.expect_chain_id().return_const(1337u64);
        client
            .expect_get_transaction_count()
            .returning(move |_| Ok(U256::from(nonce)));
        client
    }

    #[test]
    fn test_build_contract_creation_has_no_recipient() {
        let mut request = transfer();
        request.to = None;
        let tx = build_legacy_tx(&request, Address::repeat_byte(1), None, 1);
        assert!(request.is_contract_creation());
        assert!(tx.to().is_none());
        assert!(tx.nonce().is_none());
        assert_eq!(tx.gas(), Some(&U256::from(21_000)));
    }

    #[tokio::test]
    async fn test_raw_submit_broadcasts_signed_payload() {
        let hash = H256::repeat_byte(0xaa);
        let mut client = base_client(4);
        client
            .expect_send_raw_transaction()
            .times(1)
            .withf(|signed| !signed.is_empty())
            .returning(move |_| Ok(SubmitResponse::Accepted(hash)));

        let submitter = RawTransactionSubmitter::new(Arc::new(client), wallet());
        let pending = submitter.submit(&transfer()).await.unwrap();

        assert_eq!(pending, PendingTransaction::Submitted { tx_hash: hash });
    }

    #[tokio::test]
    async fn test_raw_rejection_releases_nonce() {
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let seen = payloads.clone();

        let mut client = base_client(9);
        client
            .expect_send_raw_transaction()
            .times(2)
            .returning(move |signed| {
                seen.lock().unwrap().push(signed);
                Ok(SubmitResponse::Rejected {
                    code: -32000,
                    message: "insufficient funds".to_string(),
                })
            });

        let submitter = RawTransactionSubmitter::new(Arc::new(client), wallet());
        let first = submitter.submit(&transfer()).await.unwrap();
        let second = submitter.submit(&transfer()).await.unwrap();

        assert!(first.has_error());
        assert!(second.has_error());
        // Same nonce and request signed twice yields the same payload
        let payloads = payloads.lock().unwrap();
        assert_eq!(payloads[0], payloads[1]);
    }

    #[tokio::test]
    async fn test_raw_transport_error_propagates() {
        let mut client = base_client(0);
        client
            .expect_send_raw_transaction()
            .times(1)
            .returning(|_| Err(TxManagerError::Rpc("connection reset".to_string())));

        let submitter = RawTransactionSubmitter::new(Arc::new(client), wallet());
        let result = submitter.submit(&transfer()).await;

        assert!(matches!(result, Err(TxManagerError::Rpc(_))));
    }

    /// Node whose pending count is `initial` on the first fetch and `later`
    /// afterwards; it rejects nonces below `later` as too low.
    fn moving_node(
        initial: u64,
        later: u64,
        fetches: Arc<AtomicU32>,
        send_error: bool,
    ) -> MockLedgerClient {
        let mut client = MockLedgerClient::new();
        client.expect_chain_id().return_const(1337u64);
        client.expect_get_transaction_count().returning(move |_| {
            let n = fetches.fetch_add(1, Ordering::SeqCst);
            Ok(U256::from(if n == 0 { initial } else { later }))
        });

        let sends = Arc::new(AtomicU32::new(0));
        client.expect_send_raw_transaction().returning(move |signed| {
            let first = sends.fetch_add(1, Ordering::SeqCst) == 0;
            if send_error && first {
                return Err(TxManagerError::Rpc("request timed out".to_string()));
            }
            let tx: ethers::types::Transaction = ethers::utils::rlp::decode(&signed).unwrap();
            if tx.nonce < U256::from(later) {
                Ok(SubmitResponse::Rejected {
                    code: -32000,
                    message: "nonce too low".to_string(),
                })
            } else {
                Ok(SubmitResponse::Accepted(H256::from_low_u64_be(tx.nonce.as_u64())))
            }
        });
        client
    }

    #[tokio::test]
    async fn test_nonce_too_low_refetches_from_node() {
        let fetches = Arc::new(AtomicU32::new(0));
        let client = moving_node(3, 4, fetches.clone(), false);
        let submitter = RawTransactionSubmitter::new(Arc::new(client), wallet());

        // Nonce 3 was used elsewhere after we initialized
        let first = submitter.submit(&transfer()).await.unwrap();
        assert!(first.has_error());

        let second = submitter.submit(&transfer()).await.unwrap();
        assert_eq!(second.tx_hash(), Some(H256::from_low_u64_be(4)));

        let third = submitter.submit(&transfer()).await.unwrap();
        assert_eq!(third.tx_hash(), Some(H256::from_low_u64_be(5)));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_reuse_nonce() {
        let fetches = Arc::new(AtomicU32::new(0));
        // Nonce 5 reached the node even though the response was lost
        let client = moving_node(5, 6, fetches.clone(), true);
        let submitter = RawTransactionSubmitter::new(Arc::new(client), wallet());

        let first = submitter.submit(&transfer()).await;
        assert!(matches!(first, Err(TxManagerError::Rpc(_))));

        let second = submitter.submit(&transfer()).await.unwrap();
        assert_eq!(second.tx_hash(), Some(H256::from_low_u64_be(6)));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nonce_conflict_messages() {
        assert!(is_nonce_conflict("nonce too low"));
        assert!(is_nonce_conflict("Nonce too low: next nonce 4, tx nonce 3"));
        assert!(is_nonce_conflict("already known"));
        assert!(is_nonce_conflict("replacement transaction underpriced"));
        assert!(!is_nonce_conflict("insufficient funds for gas * price + value"));
    }

    #[tokio::test]
    async fn test_delegated_submit_uses_node_account() {
        let from = Address::repeat_byte(0x11);
        let hash = H256::repeat_byte(0xbb);

        let mut client = MockLedgerClient::new();
        client.expect_chain_id().return_const(1337u64);
        client.expect_get_transaction_count().never();
        client
            .expect_send_transaction()
            .times(1)
            .withf(move |tx| tx.from() == Some(&from) && tx.nonce().is_none())
            .returning(move |_| Ok(SubmitResponse::Accepted(hash)));

        let submitter = DelegatedTransactionSubmitter::new(Arc::new(client), from);
        let pending = submitter.submit(&transfer()).await.unwrap();

        assert_eq!(pending.tx_hash(), Some(hash));
    }
}
