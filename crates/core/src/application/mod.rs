// Application Layer - Queue engine, persistence and interaction boundary

pub mod channel_store;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod engine;
pub mod registry;

// Re-exports
pub use channel_store::{ChannelStore, LoadedRecord};
pub use config::StoreConfig;
pub use dispatcher::{Action, Dispatcher, InteractionRequest, InteractionResult, Status};
pub use engine::{QueueEngine, StoreFault, StoreState};
pub use registry::StoreRegistry;
