//! Chain module - the node-facing RPC surface
//!
//! This module provides:
//! - The `LedgerClient` capability the transaction manager consumes
//! - An HTTP JSON-RPC implementation with multi-URL failover

pub mod provider;

pub use provider::ChainProvider;

use crate::error::TxResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Node answer to a submission call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// Transaction accepted into the node's pool
    Accepted(H256),
    /// JSON-RPC error object returned by the node
    Rejected { code: i64, message: String },
}

/// RPC calls against a ledger node.
///
/// Transport or protocol failures are reported through `Err`. A receipt that
/// does not exist yet is `Ok(None)`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain the node serves
    fn chain_id(&self) -> u64;

    /// eth_sendRawTransaction
    async fn send_raw_transaction(&self, signed: Bytes) -> TxResult<SubmitResponse>;

    /// eth_sendTransaction, signed by the node for an account it manages
    async fn send_transaction(&self, tx: &TypedTransaction) -> TxResult<SubmitResponse>;

    /// eth_getTransactionReceipt
    async fn get_transaction_receipt(&self, tx_hash: H256)
        -> TxResult<Option<TransactionReceipt>>;

    /// eth_getTransactionCount at the pending block
    async fn get_transaction_count(&self, address: Address) -> TxResult<U256>;
}
