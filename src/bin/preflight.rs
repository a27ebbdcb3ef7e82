use web3_storefront::domain::model::Bucket;
use web3_storefront::infra::chain::AlloyChainRpc;
use web3_storefront::infra::wallet::{claim_message, sign_message, wallet_from_config};
use web3_storefront::infra::{StoreBackend, StorefrontConfig};
use web3_storefront::storage::blobs::HttpBlobStore;
use web3_storefront::storage::rows::PgRowStore;
use web3_storefront::storage::RowStore;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--sign-claim]\n\
         \n\
         Checks the configured collaborators:\n\
           DATABASE_URL, STORAGE_URL, STORAGE_SERVICE_KEY, CHAIN_RPC_URL\n\
         --sign-claim prints a signed claim-history request body using\n\
           WALLET_PROVIDER (default local) and WALLET_PRIVATE_KEY\n"
    );
    std::process::exit(2);
}

async fn print_signed_claim(config: &StorefrontConfig) -> anyhow::Result<()> {
    let mut wallet = wallet_from_config(config.wallet_kind, config.wallet_private_key.clone());
    let address = wallet.connect().await?;
    let message = claim_message(&address, chrono::Utc::now());
    let signature = sign_message(wallet.as_ref(), &message).await?;
    wallet.disconnect().await;
    let body = serde_json::json!({
        "wallet_address": format!("{:#x}", address),
        "message": message,
        "signature": signature,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    let config = StorefrontConfig::from_env()?;
    if args.iter().any(|a| a == "--sign-claim") {
        return print_signed_claim(&config).await;
    }

    let mut failures = 0usize;
    println!("> Preflight:");
    println!("  STOREFRONT_BIND={}", config.bind_addr);
    println!("  production={}", config.production);
    for name in config.missing_settings() {
        println!("  missing: {}", name);
    }

    // Row store
    if config.store_backend == StoreBackend::Memory {
        println!("  Row store: in-memory (nothing to check)");
    } else if let Some(url) = config.database_url.as_deref() {
        let store = PgRowStore::connect_lazy(url)?;
        match store.health_check().await {
            Ok(()) => match store.ensure_schema().await {
                Ok(()) => println!("  Postgres reachable, schema ready."),
                Err(e) => {
                    failures += 1;
                    eprintln!("  Postgres reachable but schema setup failed: {}", e);
                }
            },
            Err(e) => {
                failures += 1;
                eprintln!("  Postgres unreachable: {}", e);
            }
        }
    }

    // Blob storage
    let blobs = HttpBlobStore::new(config.storage_url.clone(), config.storage_service_key.clone());
    if blobs.is_configured() {
        match blobs.list_buckets().await {
            Ok(found) => {
                for bucket in Bucket::ALL {
                    if found.iter().any(|name| name == bucket.name()) {
                        println!("  Bucket {} present.", bucket);
                    } else {
                        failures += 1;
                        eprintln!("  Bucket {} is missing.", bucket);
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("  Storage unreachable: {}", e);
            }
        }
    }

    // Chain RPC
    let chain = AlloyChainRpc::new(config.chain_rpc_url.clone());
    if chain.is_configured() {
        match chain.block_number().await {
            Ok(block) => println!("  Chain RPC reachable, latest block {}.", block),
            Err(e) => {
                failures += 1;
                eprintln!("  Chain RPC failed: {}", e);
            }
        }
    }

    if failures > 0 || !config.missing_settings().is_empty() {
        anyhow::bail!("preflight found {} failing check(s)", failures + config.missing_settings().len());
    }
    println!("> Preflight OK.");
    Ok(())
}
