// Store lifecycle state

use crate::error::AppError;
use serde::Serialize;

/// Why a store refuses writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StoreFault {
    Drift(String),
    Corrupt(String),
    UnsupportedVersion(u32),
}

impl StoreFault {
    /// Faults are the errors that need an admin to re-initialize storage
    pub fn from_error(err: &AppError) -> Option<Self> {
        match err {
            AppError::StorageDrift(reason) => Some(StoreFault::Drift(reason.clone())),
            AppError::CorruptRecord(reason) => Some(StoreFault::Corrupt(reason.clone())),
            AppError::UnsupportedVersion(v) => Some(StoreFault::UnsupportedVersion(*v)),
            _ => None,
        }
    }

    pub fn to_error(&self) -> AppError {
        match self {
            StoreFault::Drift(reason) => AppError::StorageDrift(format!(
                "{} (re-initialize storage to continue)",
                reason
            )),
            StoreFault::Corrupt(reason) => AppError::CorruptRecord(format!(
                "{} (re-initialize storage to continue)",
                reason
            )),
            StoreFault::UnsupportedVersion(v) => AppError::UnsupportedVersion(*v),
        }
    }
}

/// Uninitialized -> Loaded <-> Dirty, Loaded -> Faulted -> (reinitialize) -> Loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "fault", rename_all = "snake_case")]
pub enum StoreState {
    Uninitialized,
    Loaded,
    /// A flush is in flight
    Dirty,
    Faulted(StoreFault),
}

impl StoreState {
    pub fn is_faulted(&self) -> bool {
        matches!(self, StoreState::Faulted(_))
    }
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreState::Uninitialized => write!(f, "UNINITIALIZED"),
            StoreState::Loaded => write!(f, "LOADED"),
            StoreState::Dirty => write!(f, "DIRTY"),
            StoreState::Faulted(StoreFault::Drift(_)) => write!(f, "FAULTED(DRIFT)"),
            StoreState::Faulted(StoreFault::Corrupt(_)) => write!(f, "FAULTED(CORRUPT)"),
            StoreState::Faulted(StoreFault::UnsupportedVersion(v)) => {
                write!(f, "FAULTED(UNSUPPORTED_VERSION {})", v)
            }
        }
    }
}
