//! EVM chain access: transaction receipts, payment logs and wallet signatures.

use alloy::primitives::{Address, LogData, B256, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod payment;
pub mod signature;
pub mod static_rpc;

pub use client::AlloyChainRpc;
pub use payment::{find_payment, Payment, PaymentFilter, Transfer};
pub use signature::verify_wallet_signature;
pub use static_rpc::StaticChainRpc;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain RPC is not configured (CHAIN_RPC_URL missing)")]
    NotConfigured,
    #[error("invalid chain RPC url: {0}")]
    InvalidUrl(String),
    #[error("chain RPC request failed: {0}")]
    Rpc(String),
}

/// One emitted event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub data: LogData,
}

impl ReceiptLog {
    /// An ERC-20 `Transfer` log emitted by `token`.
    pub fn transfer(token: Address, from: Address, to: Address, value: U256) -> Self {
        Self {
            address: token,
            data: Transfer { from, to, value }.encode_log_data(),
        }
    }
}

/// Execution outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub success: bool,
    pub logs: Vec<ReceiptLog>,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `Ok(None)` when the chain does not know the transaction (yet).
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError>;
}
