// Queuebot Core - Domain Logic, Durable Record Codec & Ports
// NO platform dependencies: the chat platform is reached through port::CarrierChannel

pub mod application;
pub mod codec;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
