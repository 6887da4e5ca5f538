//! swcache worker host entry point.
//!
//! Loads configuration, installs the current version's worker and serves its
//! tools over stdio. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::worker::ClientHub;
use swcache_core::{AppConfig, CacheDb, MemoryStore, PartitionStore, SystemClock, WorkerLifecycleManager, WorkerSettings};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

async fn open_store(config: &AppConfig) -> Result<Arc<dyn PartitionStore>> {
    Ok(match &config.db_path {
        Some(path) => {
            let db = CacheDb::open(path)
                .await
                .with_context(|| format!("opening partition database {}", path.display()))?;
            Arc::new(db)
        }
        None => Arc::new(MemoryStore::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(app = %config.app_name, version = %config.version, "Starting swcache worker on stdio transport");

    let store = open_store(&config).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = WorkerLifecycleManager::new(
        WorkerSettings::from_config(&config)?,
        store,
        fetcher,
        Arc::new(SystemClock),
        Arc::new(ClientHub::new()),
    )?;
    worker.install().await?;

    let handler = handler::SwcacheServer::new(Arc::new(worker));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
