// Store configuration

use super::constants::{
    DEFAULT_LANE_IDLE_TIMEOUT, DEFAULT_MAX_CHUNK_CHARS, PLATFORM_MESSAGE_LIMIT,
};
use crate::codec::CARRIER_HEADER_RESERVE;
use crate::error::{AppError, Result};
use std::time::Duration;

/// Settings shared by every server store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Payload characters per carrier message
    pub max_chunk_chars: usize,
    /// Idle time before a dispatcher lane is retired
    pub lane_idle_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            lane_idle_timeout: DEFAULT_LANE_IDLE_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars;
        self
    }

    /// Reject chunk sizes that cannot fit in one platform message
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(AppError::Config(
                "max carrier size must be at least 1 character".to_string(),
            ));
        }
        if self.max_chunk_chars + CARRIER_HEADER_RESERVE > PLATFORM_MESSAGE_LIMIT {
            return Err(AppError::Config(format!(
                "max carrier size {} leaves no room for the {}-character header (limit {})",
                self.max_chunk_chars, CARRIER_HEADER_RESERVE, PLATFORM_MESSAGE_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let config = StoreConfig::default().with_max_chunk_chars(PLATFORM_MESSAGE_LIMIT);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let config = StoreConfig::default().with_max_chunk_chars(0);
        assert!(config.validate().is_err());
    }
}
