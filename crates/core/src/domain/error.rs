// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid queue key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Duplicate member {member} in queue {key:?}")]
    DuplicateMember { key: String, member: u64 },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
