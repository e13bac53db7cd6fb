//! JSON-RPC Server
//!
//! TCP on localhost; the gateway bridge runs on the same host.

use crate::handler::RpcHandler;
use crate::rate_limiter::UserRateLimiter;
use crate::types::{ListRequest, StoresRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use queuebot_core::application::{Dispatcher, InteractionRequest};
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9537;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
const DEFAULT_RATE_LIMIT_RATE: u32 = 5;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    /// Interactions a single user may burst
    pub rate_limit_burst: u32,
    /// Sustained interactions per second per user
    pub rate_limit_rate: u32,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            rate_limit_rate: DEFAULT_RATE_LIMIT_RATE,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, dispatcher: Dispatcher) -> Self {
        let rate_limiter = Arc::new(UserRateLimiter::new(
            config.rate_limit_burst,
            config.rate_limit_rate,
        ));
        Self {
            handler: Arc::new(RpcHandler::new(dispatcher, rate_limiter)),
            config,
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the handle and the bound address (useful with port 0).
    pub async fn start(self) -> Result<(ServerHandle, std::net::SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("queue.interact.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: InteractionRequest = params.parse()?;
                    handler.interact(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListRequest = params.parse()?;
                    handler.list(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stores.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    // Parameters are optional for this method
                    let req: Option<StoresRequest> = params.parse()?;
                    handler.stores(req.unwrap_or(StoresRequest {})).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(address = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
