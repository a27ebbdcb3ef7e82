//! Wallet capability used to sign claim-history requests.
//!
//! One trait, one variant per real provider. Providers that are not implemented are simply not
//! selectable: `WalletKind::from_str` rejects them.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet is not connected")]
    NotConnected,
    #[error("wallet key is missing (WALLET_PRIVATE_KEY)")]
    MissingKey,
    #[error("invalid wallet key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletKind {
    /// Hex private key held by the process.
    LocalKey,
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "local-key" | "local_key" => Ok(WalletKind::LocalKey),
            other => Err(format!("unsupported wallet provider '{}'", other)),
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn address(&self) -> Result<Address, WalletError>;
    fn signer(&self) -> Result<&PrivateKeySigner, WalletError>;
    fn is_connected(&self) -> bool;
    async fn connect(&mut self) -> Result<Address, WalletError>;
    async fn disconnect(&mut self);
}

pub struct LocalKeyWallet {
    private_key: Option<String>,
    signer: Option<PrivateKeySigner>,
}

impl LocalKeyWallet {
    pub fn new(private_key: Option<String>) -> Self {
        Self {
            private_key,
            signer: None,
        }
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn address(&self) -> Result<Address, WalletError> {
        Ok(self.signer()?.address())
    }

    fn signer(&self) -> Result<&PrivateKeySigner, WalletError> {
        self.signer.as_ref().ok_or(WalletError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    async fn connect(&mut self) -> Result<Address, WalletError> {
        let key = self.private_key.as_deref().ok_or(WalletError::MissingKey)?;
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let address = signer.address();
        self.signer = Some(signer);
        Ok(address)
    }

    async fn disconnect(&mut self) {
        self.signer = None;
    }
}

/// Builds the provider selected by configuration.
pub fn wallet_from_config(kind: WalletKind, private_key: Option<String>) -> Box<dyn WalletProvider> {
    match kind {
        WalletKind::LocalKey => Box::new(LocalKeyWallet::new(private_key)),
    }
}

/// Signs `message` with the connected wallet; returns the 65-byte signature as 0x-hex.
pub async fn sign_message(wallet: &dyn WalletProvider, message: &str) -> Result<String, WalletError> {
    let signature = wallet
        .signer()?
        .sign_message(message.as_bytes())
        .await
        .map_err(|e| WalletError::Signing(e.to_string()))?;
    Ok(format!("0x{}", hex::encode(signature.as_bytes())))
}

const CLAIM_PREFIX: &str = "Show purchase history for ";
const CLAIM_ISSUED: &str = " (issued ";

/// Canonical message a buyer signs to prove control of `address` for a claim-history request.
pub fn claim_message(address: &Address, issued_at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "{}{:#x}{}{})",
        CLAIM_PREFIX,
        address,
        CLAIM_ISSUED,
        issued_at.to_rfc3339()
    )
}

/// Inverse of [`claim_message`]: the named wallet and the issue time, or `None` if the text
/// is not a claim message.
pub fn parse_claim_message(message: &str) -> Option<(Address, chrono::DateTime<chrono::Utc>)> {
    let rest = message.strip_prefix(CLAIM_PREFIX)?.strip_suffix(')')?;
    let (address, issued) = rest.split_once(CLAIM_ISSUED)?;
    let address = Address::from_str(address.trim()).ok()?;
    let issued = chrono::DateTime::parse_from_rfc3339(issued.trim()).ok()?;
    Some((address, issued.with_timezone(&chrono::Utc)))
}
