//! Nonce allocation for raw transaction broadcast
//!
//! Handles:
//! - Lazy initialization from the node's pending transaction count
//! - Local allocation so concurrent submissions do not collide
//! - Releasing a nonce whose submission was rejected

use crate::chain::LedgerClient;
use crate::error::TxResult;

use ethers::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::debug;

/// Hands out nonces for a single sender address
pub struct NonceManager {
    /// Sender address
    address: Address,
    /// Next nonce to hand out, None until fetched from the node
    next: Mutex<Option<U256>>,
}

impl NonceManager {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next: Mutex::new(None),
        }
    }

    /// Allocate the next nonce, fetching the on-chain count on first use
    pub async fn next_nonce(&self, client: &dyn LedgerClient) -> TxResult<U256> {
        let mut next = self.next.lock().await;

        let nonce = match *next {
            Some(nonce) => nonce,
            None => {
                let on_chain = client.get_transaction_count(self.address).await?;
                debug!(
                    "Initialized nonce for {:?} on chain {}: {}",
                    self.address,
                    client.chain_id(),
                    on_chain
                );
                on_chain
            }
        };

        *next = Some(nonce + 1);
        debug!("Allocated nonce {} for {:?}", nonce, self.address);
        Ok(nonce)
    }

    /// Give back a nonce whose transaction never reached the pool.
    /// Only the most recently allocated nonce can be reused.
    pub async fn release_nonce(&self, nonce: U256) {
        let mut next = self.next.lock().await;
        if *next == Some(nonce + 1) {
            *next = Some(nonce);
            debug!("Released nonce {} for {:?}", nonce, self.address);
        } else {
            // A later nonce is already out; resync from the node next time
            *next = None;
        }
    }

    /// Forget local state and refetch from the node on next allocation
    pub async fn reset(&self) {
        *self.next.lock().await = None;
    }
}
