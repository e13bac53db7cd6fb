//! RPC Request/Response Types
//!
//! `queue.interact.v1` takes and returns the dispatcher's own
//! `InteractionRequest` / `InteractionResult`.

use queuebot_core::application::StoreState;
use queuebot_core::domain::{ServerId, UserId};
use serde::{Deserialize, Serialize};

/// queue.list.v1 - Read one queue
#[derive(Debug, Deserialize)]
pub struct ListRequest {
    pub server: ServerId,
    pub key: String,
    /// Members to return; all when absent
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub server: ServerId,
    pub key: String,
    pub members: Vec<UserId>,
    pub total: usize,
}

/// admin.stores.v1 - Loaded stores and their states
#[derive(Debug, Deserialize)]
pub struct StoresRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub server: ServerId,
    pub state: StoreState,
    pub language: String,
    pub queues: usize,
    pub members: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoresResponse {
    pub stores: Vec<StoreSummary>,
    pub uptime_seconds: u64,
}
