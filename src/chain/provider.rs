//! Chain provider with multi-RPC support and failover

use super::{LedgerClient, SubmitResponse};
use crate::config::NodeConfig;
use crate::error::{TxManagerError, TxResult};

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionReceipt, H256, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// HTTP provider set for one node, with manual failover between URLs.
///
/// A failed call is reported to the caller as-is; the next call goes to the
/// next URL.
pub struct ChainProvider<P = Http> {
    /// Node configuration
    config: NodeConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<P>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider<Http> {
    /// Create a new chain provider
    pub fn new(config: NodeConfig) -> TxResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        Self::with_providers(config, http_providers)
    }
}

impl<P: JsonRpcClient + 'static> ChainProvider<P> {
    /// Wrap already constructed providers, tried in order on failover
    pub fn with_providers(config: NodeConfig, http_providers: Vec<Provider<P>>) -> TxResult<Self> {
        if http_providers.is_empty() {
            return Err(TxManagerError::Config(format!(
                "No valid RPC providers for chain {}",
                config.chain_id
            )));
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<P> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        if self.http_providers.len() < 2 {
            return;
        }
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    /// Get current block number
    pub async fn get_block_number(&self) -> TxResult<u64> {
        match self.http().get_block_number().await {
            Ok(block) => Ok(block.as_u64()),
            Err(e) => Err(self.transport_error(e)),
        }
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.config.chain_id, e);
                false
            }
        }
    }

    /// Split a submission error into a node rejection or a transport failure
    fn submission_result(&self, err: ProviderError) -> TxResult<SubmitResponse> {
        if let Some(rpc_err) = err.as_error_response() {
            return Ok(SubmitResponse::Rejected {
                code: rpc_err.code,
                message: rpc_err.message.clone(),
            });
        }
        Err(self.transport_error(err))
    }

    fn transport_error(&self, err: ProviderError) -> TxManagerError {
        // JSON-RPC error objects come from a live node; anything else is the channel
        if err.as_error_response().is_none() {
            self.failover();
        }
        TxManagerError::Rpc(err.to_string())
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> LedgerClient for ChainProvider<P> {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn send_raw_transaction(&self, signed: Bytes) -> TxResult<SubmitResponse> {
        match self.http().send_raw_transaction(signed).await {
            Ok(pending_tx) => Ok(SubmitResponse::Accepted(pending_tx.tx_hash())),
            Err(e) => self.submission_result(e),
        }
    }

    async fn send_transaction(&self, tx: &TypedTransaction) -> TxResult<SubmitResponse> {
        match self
            .http()
            .request::<_, H256>("eth_sendTransaction", [tx])
            .await
        {
            Ok(tx_hash) => Ok(SubmitResponse::Accepted(tx_hash)),
            Err(e) => self.submission_result(e),
        }
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> TxResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.transport_error(e))
    }

    async fn get_transaction_count(&self, address: Address) -> TxResult<U256> {
        self.http()
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| self.transport_error(e))
    }
}
