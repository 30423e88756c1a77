//! Transaction manager - submit transactions to a ledger node and wait for
//! their receipts within a bounded polling budget.
//!
//! A [`tx::TransactionManager`] owns a signing identity and a submission
//! strategy. Each `execute` call submits once and hands the resulting hash to
//! a [`tx::ReceiptPoller`], which returns the receipt or a classified
//! [`error::TxManagerError`].

pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod tx;

pub use chain::{ChainProvider, LedgerClient, SubmitResponse};
pub use config::{PollingConfig, Settings};
pub use error::{TxManagerError, TxResult};
pub use tx::{
    DelegatedTransactionSubmitter, PendingTransaction, RawTransactionSubmitter, ReceiptPoller,
    SigningIdentity, TransactionManager, TransactionSubmitter, TxRequest,
};
