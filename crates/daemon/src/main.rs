//! Queuebot - Main Entry Point
//! Queue engine + Discord storage adapter + JSON-RPC boundary for front-ends

mod config;
mod logging;

use anyhow::Result;
use config::DaemonConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use queuebot_api_rpc::RpcServer;
use queuebot_core::application::{Dispatcher, StoreRegistry};
use queuebot_infra_discord::DiscordChannelProvider;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on waiting for in-flight flushes at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (before logging so the format is known)
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    let _log_guard = logging::init(config.log_format, config.log_dir.as_deref())?;
    info!("Queuebot v{} starting...", VERSION);
    info!(
        api_base = %config.discord.api_base,
        storage_channel = %config.discord.storage_channel,
        max_carrier_chars = config.store.max_chunk_chars,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let provider = Arc::new(
        DiscordChannelProvider::new(&config.discord)
            .map_err(|e| anyhow::anyhow!("Discord client setup failed: {}", e))?,
    );
    let bot_id = provider
        .bot_id()
        .await
        .map_err(|e| anyhow::anyhow!("Cannot reach the platform with this token: {}", e))?;
    info!(bot_id, "Authenticated");

    let registry = Arc::new(StoreRegistry::new(provider, config.store.clone())?);
    let dispatcher = Dispatcher::new(registry.clone());

    // 4. Load configured guilds eagerly; any other server loads on first use
    let loads = config.guilds.iter().map(|&guild| {
        let registry = registry.clone();
        async move { (guild, registry.get(guild).await) }
    });
    for (guild, loaded) in futures::future::join_all(loads).await {
        let engine = loaded.map_err(|e| anyhow::anyhow!("Guild {} failed to load: {}", guild, e))?;
        let state = engine.state();
        if state.is_faulted() {
            warn!(
                guild,
                state = %state,
                "Store is faulted; an admin must run storage setup"
            );
        } else {
            info!(guild, queues = engine.keys().len(), "Store ready");
        }
    }

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_server = RpcServer::new(config.rpc.clone(), dispatcher.clone());
    let (rpc_handle, rpc_addr) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(address = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: stop intake, then let in-flight flushes land
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, dispatcher.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Stores did not close in time; a save may have been cut short"
        );
    }

    info!("Shutdown complete.");

    Ok(())
}
