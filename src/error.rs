//! Error types for the transaction manager

use ethers::types::H256;
use thiserror::Error;

/// Main error type for submission and confirmation
#[derive(Error, Debug)]
pub enum TxManagerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Metrics server error: {0}")]
    Server(String),

    /// The node refused the transaction at submit time
    #[error("Error processing transaction request: {message} (code {code})")]
    Submission { code: i64, message: String },

    /// A receipt query failed at the transport or protocol level
    #[error("Receipt query for {tx_hash:?} failed on attempt {attempt}: {message}")]
    Query {
        tx_hash: H256,
        attempt: u32,
        message: String,
    },

    /// No receipt was observed within the polling budget. The transaction
    /// may still be included later.
    #[error("Transaction receipt was not generated after {attempts} attempts for transaction: {tx_hash:?}")]
    Timeout { tx_hash: H256, attempts: u32 },

    #[error("Waiting for receipt of {tx_hash:?} cancelled after {attempts} attempts")]
    Cancelled { tx_hash: H256, attempts: u32 },
}

impl TxManagerError {
    /// True when the confirmation budget ran out without a receipt
    pub fn is_timeout(&self) -> bool {
        matches!(self, TxManagerError::Timeout { .. })
    }

    /// Hash of the already submitted transaction, if the error happened
    /// after submission. Callers can use it to resume polling.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            TxManagerError::Query { tx_hash, .. }
            | TxManagerError::Timeout { tx_hash, .. }
            | TxManagerError::Cancelled { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Result type for transaction manager operations
pub type TxResult<T> = Result<T, TxManagerError>;
