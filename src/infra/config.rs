//! Centralized configuration (environment variables + defaults).
//!
//! Built once at process start and handed to every service. Missing collaborator settings are
//! reported as warnings, not errors: the affected store or client fails on first use instead.

use crate::domain::money::parse_address;
use crate::infra::wallet::WalletKind;
use alloy::primitives::Address;
use anyhow::Context;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// HTTP listen address (`STOREFRONT_BIND`, default `0.0.0.0:3000`).
    pub bind_addr: SocketAddr,
    /// Row store selection (`STOREFRONT_STORE`: `postgres` | `memory`).
    pub store_backend: StoreBackend,
    /// Postgres connection string (`DATABASE_URL`).
    pub database_url: Option<String>,
    /// Blob storage base URL (`STORAGE_URL`).
    pub storage_url: Option<String>,
    /// Privileged blob storage key (`STORAGE_SERVICE_KEY`). Server-side only.
    pub storage_service_key: Option<String>,
    /// EVM JSON-RPC endpoint (`CHAIN_RPC_URL`).
    pub chain_rpc_url: Option<String>,
    /// Only transfers emitted by this ERC-20 contract count as payment (`PAYMENT_TOKEN_ADDRESS`).
    pub payment_token_address: Option<Address>,
    /// Only transfers to this address count as payment (`MERCHANT_ADDRESS`).
    pub merchant_address: Option<Address>,
    /// `APP_ENV=production` hides panic details from error responses.
    pub production: bool,
    /// Wallet provider used by the preflight signing helper (`WALLET_PROVIDER`, default `local`).
    pub wallet_kind: WalletKind,
    /// Key for the local wallet provider (`WALLET_PRIVATE_KEY`).
    pub wallet_private_key: Option<String>,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl StorefrontConfig {
    /// Reads the process environment (after loading `.env` if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(optional_var)
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("STOREFRONT_BIND")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .with_context(|| "parse STOREFRONT_BIND")?;
        let store_backend = match lookup("STOREFRONT_STORE").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("STOREFRONT_STORE must be 'postgres' or 'memory', got '{}'", other),
        };
        let payment_token_address = lookup("PAYMENT_TOKEN_ADDRESS")
            .map(|v| parse_address(&v).map_err(anyhow::Error::msg))
            .transpose()
            .with_context(|| "parse PAYMENT_TOKEN_ADDRESS")?;
        let merchant_address = lookup("MERCHANT_ADDRESS")
            .map(|v| parse_address(&v).map_err(anyhow::Error::msg))
            .transpose()
            .with_context(|| "parse MERCHANT_ADDRESS")?;
        let wallet_kind = lookup("WALLET_PROVIDER")
            .unwrap_or_else(|| "local".to_string())
            .parse::<WalletKind>()
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            bind_addr,
            store_backend,
            database_url: lookup("DATABASE_URL"),
            storage_url: lookup("STORAGE_URL"),
            storage_service_key: lookup("STORAGE_SERVICE_KEY"),
            chain_rpc_url: lookup("CHAIN_RPC_URL"),
            payment_token_address,
            merchant_address,
            production: lookup("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            wallet_kind,
            wallet_private_key: lookup("WALLET_PRIVATE_KEY"),
        })
    }

    /// Defaults with every collaborator unset; the starting point for tests.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            store_backend: StoreBackend::Memory,
            database_url: None,
            storage_url: None,
            storage_service_key: None,
            chain_rpc_url: None,
            payment_token_address: None,
            merchant_address: None,
            production: false,
            wallet_kind: WalletKind::LocalKey,
            wallet_private_key: None,
        }
    }

    /// Names of collaborator settings that are missing for the selected backends.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            missing.push("DATABASE_URL");
        }
        if self.storage_url.is_none() {
            missing.push("STORAGE_URL");
        }
        if self.storage_service_key.is_none() {
            missing.push("STORAGE_SERVICE_KEY");
        }
        if self.chain_rpc_url.is_none() {
            missing.push("CHAIN_RPC_URL");
        }
        missing
    }

    /// Logs one startup warning per missing setting.
    pub fn warn_missing(&self) {
        for name in self.missing_settings() {
            tracing::warn!(setting = name, "configuration missing; dependent calls will fail at runtime");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults_and_warnings() {
        let cfg = StorefrontConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert!(!cfg.production);
        assert_eq!(
            cfg.missing_settings(),
            vec!["DATABASE_URL", "STORAGE_URL", "STORAGE_SERVICE_KEY", "CHAIN_RPC_URL"]
        );
    }

    #[test]
    fn parses_addresses_and_flags() {
        let cfg = StorefrontConfig::from_lookup(lookup_from(&[
            ("STOREFRONT_STORE", "memory"),
            ("APP_ENV", "Production"),
            ("MERCHANT_ADDRESS", "0x52908400098527886e0f7030069857d2e4169ee7"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.production);
        assert!(cfg.merchant_address.is_some());
        assert!(!cfg.missing_settings().contains(&"DATABASE_URL"));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(StorefrontConfig::from_lookup(lookup_from(&[("STOREFRONT_STORE", "redis")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup_from(&[("MERCHANT_ADDRESS", "nope")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup_from(&[("WALLET_PROVIDER", "ledger")])).is_err());
    }
}
