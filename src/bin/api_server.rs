// src/bin/api_server.rs

use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use web3_storefront::infra::chain::{AlloyChainRpc, ChainRpc};
use web3_storefront::infra::logging::init_logging;
use web3_storefront::infra::{StoreBackend, StorefrontConfig};
use web3_storefront::storage::blobs::HttpBlobStore;
use web3_storefront::storage::rows::{MemoryRowStore, PgRowStore};
use web3_storefront::storage::{BlobStore, RowStore};
use web3_storefront::transport;

async fn build_row_store(config: &StorefrontConfig) -> anyhow::Result<Arc<dyn RowStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory row store; data is lost on restart");
            Ok(Arc::new(MemoryRowStore::new()))
        }
        StoreBackend::Postgres => {
            let Some(url) = config.database_url.as_deref() else {
                return Ok(Arc::new(PgRowStore::unconfigured()));
            };
            let store = PgRowStore::connect_lazy(url)?;
            match store.ensure_schema().await {
                Ok(()) => tracing::info!("postgres schema ready"),
                Err(e) => tracing::warn!(error = %e, "could not prepare postgres schema; continuing"),
            }
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Arc::new(StorefrontConfig::from_env()?);
    config.warn_missing();

    // --- Collaborators ---
    let rows = build_row_store(&config).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(HttpBlobStore::new(
        config.storage_url.clone(),
        config.storage_service_key.clone(),
    ));
    let chain: Arc<dyn ChainRpc> = Arc::new(AlloyChainRpc::new(config.chain_rpc_url.clone()));
    if config.payment_token_address.is_none() || config.merchant_address.is_none() {
        tracing::warn!("PAYMENT_TOKEN_ADDRESS / MERCHANT_ADDRESS not set; any ERC-20 transfer counts as payment");
    }
    tracing::info!(store = rows.backend_name(), production = config.production, "services initialized");

    // --- API Server Initialization ---
    let app_state = transport::http::AppState::new(config.clone(), rows, blobs, chain);
    let app = transport::http::create_router(app_state).merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()),
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "API server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui", config.bind_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
