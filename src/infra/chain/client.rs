// Responsible for all communication with the EVM chain RPC endpoint.

use super::{ChainError, ChainRpc, ReceiptLog, TxReceipt};
use alloy::primitives::B256;
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;

/// Receipt lookups over JSON-RPC/HTTP. A provider is built per call; nothing is cached.
pub struct AlloyChainRpc {
    rpc_url: Option<String>,
}

impl AlloyChainRpc {
    /// `None` leaves the client unconfigured; lookups then fail with `NotConfigured`.
    pub fn new(rpc_url: Option<String>) -> Self {
        Self { rpc_url }
    }

    pub fn is_configured(&self) -> bool {
        self.rpc_url.is_some()
    }

    /// Latest block number; used by the preflight check.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let rpc_url = self.rpc_url.as_deref().ok_or(ChainError::NotConfigured)?;
        let url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidUrl(format!("{}: {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url);
        provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl ChainRpc for AlloyChainRpc {
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        let rpc_url = self.rpc_url.as_deref().ok_or(ChainError::NotConfigured)?;
        let url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidUrl(format!("{}: {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url);

        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let Some(receipt) = receipt else {
            tracing::debug!(tx = %tx_hash, "receipt not found");
            return Ok(None);
        };

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| ReceiptLog {
                address: log.inner.address,
                data: log.inner.data.clone(),
            })
            .collect();
        Ok(Some(TxReceipt {
            success: receipt.status(),
            logs,
        }))
    }
}
