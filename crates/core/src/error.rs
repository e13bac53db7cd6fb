// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Storage drift: {0}")]
    StorageDrift(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Unsupported record version: {0}")]
    UnsupportedVersion(u32),

    #[error("Channel error: {0}")]
    Channel(#[from] crate::port::ChannelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for key validation failures
    pub fn is_invalid_key(&self) -> bool {
        matches!(
            self,
            AppError::Domain(crate::domain::DomainError::InvalidKey { .. })
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
