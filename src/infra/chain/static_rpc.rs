//! Fixed-answer chain RPC for tests and offline development.

use super::{ChainError, ChainRpc, TxReceipt};
use alloy::primitives::B256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone)]
enum Answer {
    Receipt(TxReceipt),
    Error(String),
}

#[derive(Default)]
pub struct StaticChainRpc {
    answers: RwLock<HashMap<B256, Answer>>,
    calls: AtomicUsize,
}

impl StaticChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_receipt(&self, tx_hash: B256, receipt: TxReceipt) {
        if let Ok(mut answers) = self.answers.write() {
            answers.insert(tx_hash, Answer::Receipt(receipt));
        }
    }

    /// Lookups of `tx_hash` fail with an RPC error.
    pub fn set_error(&self, tx_hash: B256, message: &str) {
        if let Ok(mut answers) = self.answers.write() {
            answers.insert(tx_hash, Answer::Error(message.to_string()));
        }
    }

    /// Total receipt lookups served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for StaticChainRpc {
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .read()
            .map_err(|_| ChainError::Rpc("answers lock poisoned".to_string()))?
            .get(&tx_hash)
            .cloned();
        match answer {
            None => Ok(None),
            Some(Answer::Receipt(r)) => Ok(Some(r)),
            Some(Answer::Error(msg)) => Err(ChainError::Rpc(msg)),
        }
    }
}
