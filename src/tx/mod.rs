//! Transaction submission and receipt confirmation

mod identity;
mod manager;
mod nonce;
mod poller;
mod submitter;

pub use identity::{load_wallet, SigningIdentity};
pub use manager::TransactionManager;
pub use nonce::NonceManager;
pub use poller::ReceiptPoller;
pub use submitter::{DelegatedTransactionSubmitter, RawTransactionSubmitter, TransactionSubmitter};

use crate::config::TxRequestConfig;

use ethers::types::{Address, Bytes, H256, U256};

/// Parameters of a transaction to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub gas_price: U256,
    pub gas_limit: U256,
    /// None deploys a contract
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
}

impl TxRequest {
    pub fn new(
        gas_price: U256,
        gas_limit: U256,
        to: Option<Address>,
        data: Bytes,
        value: U256,
    ) -> Self {
        Self {
            gas_price,
            gas_limit,
            to,
            data,
            value,
        }
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

impl From<TxRequestConfig> for TxRequest {
    fn from(config: TxRequestConfig) -> Self {
        Self::new(
            config.gas_price,
            config.gas_limit,
            config.to,
            config.data,
            config.value,
        )
    }
}

/// Immediate outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTransaction {
    Submitted { tx_hash: H256 },
    Rejected { code: i64, message: String },
}

impl PendingTransaction {
    pub fn has_error(&self) -> bool {
        matches!(self, PendingTransaction::Rejected { .. })
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            PendingTransaction::Submitted { tx_hash } => Some(*tx_hash),
            PendingTransaction::Rejected { .. } => None,
        }
    }
}
