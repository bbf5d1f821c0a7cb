//! Content Gateway - serves gated creator content from Walrus
//!
//! Checks access, fetches and decrypts content, and keeps unlocked content
//! in a local cache.

use content_cache::{ContentCache, FileBackend};
use content_gateway::server::{start_server, ServerState, SharedState};
use content_gateway::{ContentPipeline, GatewayConfig, HttpAccessOracle, Result};
use sealed_content::{AccessControl, FileKeyRegistry, SealService, StaticAccessList};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use walrus_client::WalrusClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("content_gateway=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Content Gateway...");

    let config = GatewayConfig::from_env();
    config.validate()?;
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Key registry: {:?}", config.key_registry_path);
    info!(
        "Max cacheable size: {} MB",
        config.max_cacheable_size / (1024 * 1024)
    );
    info!("Cache TTL: {} seconds", config.cache_ttl_secs);
    info!("Walrus aggregator: {}", config.walrus.aggregator);

    let cache = ContentCache::new(
        Arc::new(FileBackend::new(&config.cache_dir)),
        config.cache_config(),
    );
    let blobs = Arc::new(WalrusClient::new(config.walrus.clone())?);
    let registry = Arc::new(FileKeyRegistry::open(&config.key_registry_path).await?);

    let access: Arc<dyn AccessControl> = match &config.access_oracle_url {
        Some(url) => {
            info!("Access oracle: {}", url);
            Arc::new(HttpAccessOracle::new(url)?)
        }
        None => {
            warn!("ACCESS_ORACLE_URL not set, gated content will stay locked");
            Arc::new(StaticAccessList::new())
        }
    };

    let pipeline = ContentPipeline::new(cache, blobs, SealService::new(registry, access));
    pipeline.init().await;

    let sweeper = spawn_sweeper(
        pipeline.clone(),
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    );

    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set, cache maintenance routes are disabled");
    }
    let state: SharedState = Arc::new(
        ServerState::new(pipeline.clone()).with_admin_token(config.admin_token.clone()),
    );

    // Start HTTP server (blocking until shutdown)
    let served = start_server(state, config.port, shutdown_signal()).await;

    sweeper.abort();
    pipeline.close().await;
    info!("Content Gateway stopped");

    served?;
    Ok(())
}

fn spawn_sweeper(pipeline: ContentPipeline, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = pipeline.sweep_expired().await;
            if removed > 0 {
                info!(removed, "Swept expired cache entries");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
