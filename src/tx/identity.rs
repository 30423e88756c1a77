//! Signing identities

use crate::error::{TxManagerError, TxResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature};

/// Key material able to name its sender address and sign transactions
#[async_trait]
pub trait SigningIdentity: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_transaction(&self, tx: &TypedTransaction) -> TxResult<Signature>;
}

#[async_trait]
impl SigningIdentity for LocalWallet {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_transaction(&self, tx: &TypedTransaction) -> TxResult<Signature> {
        Signer::sign_transaction(self, tx)
            .await
            .map_err(|e| TxManagerError::Signing(e.to_string()))
    }
}

/// Load a wallet from the private key held in `env_var`
pub fn load_wallet(env_var: &str, chain_id: u64) -> TxResult<LocalWallet> {
    let key = std::env::var(env_var).map_err(|_| {
        TxManagerError::Wallet(format!("No wallet configured. Set {}", env_var))
    })?;

    key.trim()
        .parse::<LocalWallet>()
        .map(|wallet| wallet.with_chain_id(chain_id))
        .map_err(|e| TxManagerError::Wallet(format!("Invalid private key: {}", e)))
}
