//! HypeMatch Image Proxy - local image cache in front of remote image URLs
//!
//! Serves images already on disk and sends clients to the remote URL on a
//! miss while the image is cached in the background.

mod config;
mod error;
mod server;
mod types;

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::server::{spawn_eviction_sweeper, start_server, ServerState, SharedState};
use image_file_cache::ImageCacheManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("hypematch_image_proxy=info".parse()?)
        .add_directive("image_file_cache=info".parse()?);

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

    info!("Starting HypeMatch Image Proxy...");

    let config = ProxyConfig::from_env();
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache.cache_dir);
    info!("Retention: {} days", config.retention_days);
    info!("Sweep interval: {} seconds", config.sweep_interval_secs);

    // One cache for the whole process
    let cache = ImageCacheManager::new(config.cache.clone())?;
    cache.init().await?;

    let state: SharedState = Arc::new(ServerState::new(cache, config.retention_days));

    let _sweeper = spawn_eviction_sweeper(
        Arc::clone(&state),
        Duration::from_secs(config.sweep_interval_secs),
    );

    start_server(state, config.port).await?;

    Ok(())
}
