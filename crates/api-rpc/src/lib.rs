//! JSON-RPC API Layer
//!
//! Exposes the interaction dispatcher to chat front-ends (gateway bridges)
//! as JSON-RPC 2.0 methods.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
