//! mcap-cache entry point.
//!
//! Boots the offline asset cache in front of the site origin: installs the
//! current cache generation, activates it (evicting older generations),
//! then serves every request network-first with cache fallback.
//! Logs go to stderr as JSON; filter with RUST_LOG.

use std::sync::Arc;

use anyhow::{Context, Result};
use mcap_client::{FetchClient, FetchConfig};
use mcap_core::{AppConfig, CacheDb, CacheWorker};
use tracing_subscriber::EnvFilter;

mod error;
mod proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.require_origin()?;

    tracing::info!(
        origin,
        version = %config.cache_version,
        assets = config.manifest.len(),
        "starting mcap-cache"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store {}", config.db_path.display()))?;
    let fetcher = Arc::new(FetchClient::new(origin, FetchConfig::from(&config))?);

    let worker = CacheWorker::new(config.cache_version.clone(), config.manifest.clone(), fetcher, db)?
        .with_install_concurrency(config.install_concurrency);

    worker.on_install().await.context("install failed; will retry on next start")?;
    worker.on_activate().await?;

    let app = proxy::router(proxy::ProxyState::new(Arc::new(worker), config.max_bytes));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    tracing::info!(addr = %config.listen_addr, "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
