//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::UserRateLimiter;
use crate::types::{
    ListRequest, ListResponse, StoreSummary, StoresRequest, StoresResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use queuebot_core::application::{Dispatcher, InteractionRequest, InteractionResult};
use std::sync::Arc;
use tracing::warn;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    dispatcher: Dispatcher,
    rate_limiter: Arc<UserRateLimiter>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(dispatcher: Dispatcher, rate_limiter: Arc<UserRateLimiter>) -> Self {
        Self {
            dispatcher,
            rate_limiter,
            start_time: std::time::Instant::now(),
        }
    }

    /// queue.interact.v1
    ///
    /// Engine outcomes, including failures, come back as a status in the
    /// result; only throttling is a JSON-RPC error.
    pub async fn interact(
        &self,
        request: InteractionRequest,
    ) -> Result<InteractionResult, ErrorObjectOwned> {
        if !self.rate_limiter.check(request.actor.id) {
            warn!(
                server = %request.server,
                actor = request.actor.id,
                "Interaction throttled"
            );
            return Err(throttled());
        }

        Ok(self.dispatcher.dispatch(request).await)
    }

    /// queue.list.v1
    pub async fn list(&self, params: ListRequest) -> Result<ListResponse, ErrorObjectOwned> {
        let engine = self
            .dispatcher
            .registry()
            .get(params.server)
            .await
            .map_err(to_rpc_error)?;

        let total = engine.count(&params.key).map_err(to_rpc_error)?;
        let members = match params.limit {
            Some(limit) => engine.list_front(&params.key, limit),
            None => engine.list(&params.key),
        }
        .map_err(to_rpc_error)?;

        Ok(ListResponse {
            server: params.server,
            key: params.key,
            members,
            total,
        })
    }

    /// admin.stores.v1
    pub async fn stores(&self, _params: StoresRequest) -> Result<StoresResponse, ErrorObjectOwned> {
        let registry = self.dispatcher.registry();
        let stores = registry
            .states()
            .into_iter()
            .filter_map(|(server, state)| {
                let engine = registry.loaded(server)?;
                let snapshot = engine.snapshot();
                Some(StoreSummary {
                    server,
                    state,
                    language: snapshot.settings.language.clone(),
                    queues: snapshot.len(),
                    members: snapshot.member_count(),
                })
            })
            .collect();

        Ok(StoresResponse {
            stores,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}
