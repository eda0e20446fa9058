use anyhow::Context as _;
use latch_api::{serve, Config};
use latch_core::store::Store;
use latch_engine::Coordinator;
use latch_storage::SledStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load(&config_path).with_context(|| format!("loading {config_path}"))?;

    let store: Arc<dyn Store> =
        Arc::new(SledStore::open(&config.db_path, config.cache_bytes).context("opening database")?);
    let coordinator = Arc::new(Coordinator::new(store));
    let stats = coordinator
        .recover_locks()
        .context("recovering persistent locks")?;
    info!(
        reinstalled = stats.reinstalled,
        expired = stats.expired,
        "startup recovery complete"
    );

    let flusher = Arc::clone(coordinator.flusher());
    let flush_thread = flusher.spawn();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(&config, Arc::clone(&coordinator)))?;

    // HTTP surface is down; reject new requests and drain what's in flight
    flusher.stop();
    flush_thread
        .join()
        .map_err(|_| anyhow::anyhow!("flush thread panicked"))?;
    info!("shutdown complete");
    Ok(())
}
