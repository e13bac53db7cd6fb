// Domain Layer - Pure business logic and entities

pub mod error;
pub mod member;
pub mod queue;
pub mod store;

// Re-exports
pub use error::DomainError;
pub use member::{Member, Role, ServerId, UserId};
pub use queue::{Queue, QueueKey, MAX_KEY_CHARS};
pub use store::{Store, StoreSettings, DEFAULT_LANGUAGE};
