//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use queuebot_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const THROTTLED: i32 = 4003;
    pub const UNAUTHORIZED: i32 = 4010;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const PERSISTENCE_ERROR: i32 = 5001;
    pub const STORAGE_FAULT: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Domain(_) | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::Unauthorized(_) => code::UNAUTHORIZED,
        AppError::PersistenceFailure(_) | AppError::Channel(_) => code::PERSISTENCE_ERROR,
        AppError::StorageDrift(_) | AppError::CorruptRecord(_) | AppError::UnsupportedVersion(_) => {
            code::STORAGE_FAULT
        }
        AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
